// HTTP client construction shared by the controller and LAPI clients.
//
// Both talk to hosts on the local network that often present self-signed
// or privately issued certificates, so TLS trust is configurable per host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Certificate, Client, ClientBuilder};

use crate::error::Error;

const USER_AGENT: &str = concat!("unibouncer/", env!("CARGO_PKG_VERSION"));

/// Which server certificates to trust.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// The platform trust store.
    System,
    /// Only the PEM bundle at this path (plus the platform store).
    CustomCa(PathBuf),
    /// Anything, including self-signed certificates. The UniFi default.
    #[default]
    DangerAcceptInvalid,
}

/// Per-host transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout, connect included.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// A plain client: no default headers, no cookies.
    pub fn build_client(&self) -> Result<Client, Error> {
        finish(self.builder()?)
    }

    /// A client that sends `headers` on every request (API keys).
    pub(crate) fn client_with_headers(&self, headers: HeaderMap) -> Result<Client, Error> {
        finish(self.builder()?.default_headers(headers))
    }

    /// A client that keeps the session cookie set at login.
    pub(crate) fn session_client(&self) -> Result<Client, Error> {
        finish(self.builder()?.cookie_store(true))
    }

    fn builder(&self) -> Result<ClientBuilder, Error> {
        let builder = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        Ok(match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        })
    }
}

fn load_ca(path: &Path) -> Result<Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {e}", path.display())))?;
    Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("invalid CA bundle {}: {e}", path.display())))
}

fn finish(builder: ClientBuilder) -> Result<Client, Error> {
    builder
        .build()
        .map_err(|e| Error::Tls(format!("cannot build HTTP client: {e}")))
}
