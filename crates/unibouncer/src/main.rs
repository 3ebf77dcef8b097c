mod cli;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use unibouncer_config::Settings;
use unibouncer_core::{DecisionSource, Engine, IpFamily, UnifiFirewall, run_bouncer};

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "info",
        1 => "info,unibouncer_core=debug",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init(args) => {
            let path = cli
                .global
                .config
                .clone()
                .unwrap_or_else(unibouncer_config::config_path);
            unibouncer_config::write_default_config(&path, args.force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Check => check(&cli.global).await,
        Command::Run => serve(&cli.global).await,
    }
}

fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let config = unibouncer_config::load_config(global.config.as_deref())?;
    Ok(config.resolve()?)
}

/// Connect, bootstrap, and print what the bouncer would manage.
async fn check(global: &GlobalOpts) -> Result<(), CliError> {
    let settings = load_settings(global)?;
    // Fails early on an unusable LAPI config (bad CA file, bad key header).
    DecisionSource::from_config(&settings.source)?;

    let firewall = UnifiFirewall::connect(&settings.controller).await?;
    let engine = Engine::bootstrap(firewall, settings.engine).await?;

    let mode = if engine.zone_based() {
        "zone-based policies"
    } else {
        "firewall rules"
    };
    println!("Controller: {}", settings.controller.url);
    println!("Site:       {}", settings.controller.site);
    println!("Wiring:     {mode}");
    for family in engine.families() {
        let groups = engine.store().groups();
        println!(
            "{family}: {} group(s), {} address(es)",
            groups.group_count(family),
            engine.store().addresses().len(family),
        );
    }
    if !engine.families().any(|f| f == IpFamily::V6) {
        println!("IPv6 disabled");
    }
    Ok(())
}

/// Run until interrupted or until either side of the pipeline fails.
async fn serve(global: &GlobalOpts) -> Result<(), CliError> {
    let settings = load_settings(global)?;
    let source = DecisionSource::from_config(&settings.source)?;

    let firewall = UnifiFirewall::connect(&settings.controller).await?;
    let engine = Engine::bootstrap(firewall, settings.engine).await?;
    info!(
        site = %settings.controller.site,
        zone_based = engine.zone_based(),
        "bouncer started"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let engine = run_bouncer(engine, source, settings.sync, cancel).await?;
    if engine.has_pending() {
        warn!("stopping with unpushed changes; they will be re-derived on next start");
    }
    if let Err(e) = engine.controller().close().await {
        warn!(error = %e, "failed to close controller session");
    }
    info!("bouncer stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = cancel.cancelled() => return,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "cannot listen for ctrl-c");
                return;
            }
        }
        () = terminate => {}
    }
    info!("shutdown requested");
    cancel.cancel();
}
