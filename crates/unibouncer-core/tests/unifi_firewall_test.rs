#![allow(clippy::unwrap_used)]
// End-to-end engine tests against a wiremock UniFi controller and LAPI.

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unibouncer_api::{ControllerPlatform, LapiClient, LegacyClient};
use unibouncer_core::{
    AuthCredentials, ControllerConfig, CoreError, DecisionSource, Engine, EngineConfig,
    FirewallMode, IpFamily, SourceConfig, SyncConfig, TlsVerification, UnifiFirewall,
    run_bouncer,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn firewall(server: &MockServer) -> UnifiFirewall {
    UnifiFirewall::new(LegacyClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "default".into(),
        ControllerPlatform::ClassicController,
    ))
}

fn site_path(suffix: &str) -> String {
    format!("/api/s/default/{suffix}")
}

fn v2_path(suffix: &str) -> String {
    format!("/v2/api/site/default/{suffix}")
}

fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "meta": { "rc": "ok" }, "data": data }))
}

fn config() -> EngineConfig {
    EngineConfig {
        ipv6_enabled: false,
        ..EngineConfig::default()
    }
}

async fn mount_rules_site(server: &MockServer, groups: serde_json::Value, rules: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(v2_path("firewall/zone")))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(envelope(groups))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallrule")))
        .respond_with(envelope(rules))
        .mount(server)
        .await;
}

fn source_config(lapi: &MockServer) -> SourceConfig {
    SourceConfig {
        url: Url::parse(&lapi.uri()).unwrap(),
        api_key: "bouncer-key".to_string().into(),
        tls: TlsVerification::SystemDefaults,
        timeout: Duration::from_secs(5),
        update_interval: Duration::from_secs(3600),
        origins: Vec::new(),
        scopes: Vec::new(),
    }
}

// ── Engine against a rules-mode controller ──────────────────────────

#[tokio::test]
async fn test_unmigrated_site_falls_back_to_rules() {
    let server = MockServer::start().await;
    mount_rules_site(&server, json!([]), json!([])).await;

    let engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    assert!(!engine.zone_based());
}

#[tokio::test]
async fn test_first_push_creates_group_and_rules() {
    let server = MockServer::start().await;
    mount_rules_site(&server, json!([]), json!([])).await;

    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallgroup")))
        .and(body_partial_json(json!({
            "name": "cs-unibouncer-ipv4-0",
            "group_type": "address-group",
            "group_members": ["5.6.7.8"]
        })))
        .respond_with(envelope(json!([{
            "_id": "g0", "name": "cs-unibouncer-ipv4-0",
            "group_type": "address-group", "group_members": ["5.6.7.8"]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallrule")))
        .and(body_partial_json(json!({
            "action": "drop",
            "src_firewallgroup_ids": ["g0"],
            "src_networkconf_type": "NETv4",
            "rule_index": 22000
        })))
        .respond_with(envelope(json!([{ "_id": "r0", "name": "rule" }])))
        .expect(2)
        .mount(&server)
        .await;

    let mut engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    let batch = [
        unibouncer_core::Decision::add("1.2.3.4".parse().unwrap(), "crowdsec"),
        unibouncer_core::Decision::add("5.6.7.8".parse().unwrap(), "crowdsec"),
        unibouncer_core::Decision::remove("1.2.3.4".parse().unwrap(), "crowdsec"),
    ];
    engine.process(&batch).await.unwrap();

    let report = engine.reconcile(IpFamily::V4).await;
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failed);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn test_restart_reuses_existing_group_and_rules() {
    let server = MockServer::start().await;
    mount_rules_site(
        &server,
        json!([
            { "_id": "g0", "name": "cs-unibouncer-ipv4-0",
              "group_type": "address-group", "group_members": ["1.2.3.4"] },
            { "_id": "p1", "name": "ssh", "group_type": "port-group", "group_members": ["22"] }
        ]),
        json!([
            { "_id": "r0", "name": "cs-unibouncer-WAN_IN-0", "ruleset": "WAN_IN" },
            { "_id": "r1", "name": "cs-unibouncer-WAN_LOCAL-0", "ruleset": "WAN_LOCAL" }
        ]),
    )
    .await;

    Mock::given(method("PUT"))
        .and(path(site_path("rest/firewallgroup/g0")))
        .and(body_partial_json(json!({ "group_members": ["1.2.3.4", "5.6.7.8"] })))
        .respond_with(envelope(json!([{
            "_id": "g0", "name": "cs-unibouncer-ipv4-0", "group_type": "address-group"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    assert_eq!(engine.store().addresses().len(IpFamily::V4), 1);

    let add = unibouncer_core::Decision::add("1.2.3.4".parse().unwrap(), "crowdsec");
    engine.process(&[add]).await.unwrap();
    // Already blocked: nothing to push.
    assert!(!engine.has_pending());

    let add = unibouncer_core::Decision::add("5.6.7.8".parse().unwrap(), "crowdsec");
    engine.process(&[add]).await.unwrap();
    let report = engine.reconcile(IpFamily::V4).await;
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failed);
    assert_eq!((report.pushed, report.created), (1, 0));
}

#[tokio::test]
async fn test_failed_push_leaves_group_dirty() {
    let server = MockServer::start().await;
    mount_rules_site(&server, json!([]), json!([])).await;

    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let mut engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    let add = unibouncer_core::Decision::add("1.2.3.4".parse().unwrap(), "crowdsec");
    engine.process(&[add]).await.unwrap();

    let report = engine.reconcile(IpFamily::V4).await;
    assert_eq!(report.failed.len(), 1);
    assert!(engine.has_pending());
}

// ── Zones mode ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_zone_site_wires_policies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(v2_path("firewall/zone")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "z-ext", "name": "External" },
            { "_id": "z-int", "name": "Internal" },
            { "_id": "z-gw", "name": "Gateway" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(envelope(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(v2_path("firewall-policies")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "pre-1", "name": "Allow Return Traffic", "action": "ALLOW", "predefined": true,
              "source": { "zone_id": "z-ext", "matching_target": "ANY" },
              "destination": { "zone_id": "z-int", "matching_target": "ANY" } }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(envelope(json!([{
            "_id": "g0", "name": "cs-unibouncer-ipv4-0", "group_type": "address-group"
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(v2_path("firewall-policies")))
        .and(body_partial_json(json!({
            "action": "BLOCK",
            "ip_version": "IPV4",
            "source": { "zone_id": "z-ext", "ip_group_id": "g0", "matching_target": "IP" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "p-new", "name": "cs", "action": "BLOCK",
            "source": { "zone_id": "z-ext", "matching_target": "IP" },
            "destination": { "zone_id": "z-int", "matching_target": "ANY" }
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(v2_path("firewall-policies/batch-reorder")))
        .and(body_partial_json(json!({ "before_predefined_ids": ["p-new"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let mut engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    assert!(engine.zone_based());

    let add = unibouncer_core::Decision::add("1.2.3.4".parse().unwrap(), "crowdsec");
    engine.process(&[add]).await.unwrap();
    let report = engine.reconcile(IpFamily::V4).await;
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failed);
}

#[tokio::test]
async fn test_missing_zone_fails_first_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(envelope(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(v2_path("firewall/zone")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "z-ext", "name": "External" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(v2_path("firewall-policies")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = EngineConfig {
        mode: FirewallMode::Zones,
        ..config()
    };
    let mut engine = Engine::bootstrap(firewall(&server), config).await.unwrap();
    let add = unibouncer_core::Decision::add("1.2.3.4".parse().unwrap(), "crowdsec");
    let err = engine.process(&[add]).await.unwrap_err();
    assert!(matches!(err, CoreError::Bootstrap { .. }), "got: {err:?}");
}

// ── Decision source ─────────────────────────────────────────────────

#[tokio::test]
async fn test_startup_pull_failure_is_fatal() {
    let lapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db locked"))
        .mount(&lapi)
        .await;

    let source = DecisionSource::from_config(&source_config(&lapi)).unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let err = source.run(tx, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_startup_pull_is_forwarded_as_one_batch() {
    let lapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .and(query_param("startup", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "new": [
                { "origin": "crowdsec", "type": "ban", "scope": "Ip", "value": "1.2.3.4" },
                { "origin": "cscli", "type": "ban", "scope": "Range", "value": "10.0.0.0/24" }
            ],
            "deleted": null
        })))
        .mount(&lapi)
        .await;

    let client = LapiClient::with_client(reqwest::Client::new(), Url::parse(&lapi.uri()).unwrap());
    let source = DecisionSource::new(client, &source_config(&lapi));
    let (tx, mut rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(source.run(tx, cancel.clone()));

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1].address.to_string(), "10.0.0.0/24");

    cancel.cancel();
    task.await.unwrap().unwrap();
}

// ── Supervisor ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_bouncer_pushes_startup_decisions() {
    let lapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "new": [{ "origin": "crowdsec", "type": "ban", "scope": "Ip", "value": "1.2.3.4" }],
            "deleted": []
        })))
        .mount(&lapi)
        .await;

    let server = MockServer::start().await;
    mount_rules_site(&server, json!([]), json!([])).await;
    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(envelope(json!([{
            "_id": "g0", "name": "cs-unibouncer-ipv4-0", "group_type": "address-group"
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(site_path("rest/firewallrule")))
        .respond_with(envelope(json!([{ "_id": "r0", "name": "rule" }])))
        .expect(2)
        .mount(&server)
        .await;

    let engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    let source = DecisionSource::from_config(&source_config(&lapi)).unwrap();
    let sync = SyncConfig {
        inactivity: Duration::from_millis(20),
        initial_delay: Duration::from_millis(20),
        retry: Duration::from_secs(60),
        channel_capacity: 4,
    };
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_bouncer(engine, source, sync, cancel.clone()));

    // Wait until both rules are in, then stop.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let requests = server.received_requests().await.unwrap();
        let rule_posts = requests
            .iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path().ends_with("rest/firewallrule"))
            .count();
        if rule_posts == 2 || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bouncer_stops_when_lapi_rejects_key() {
    let lapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&lapi)
        .await;

    let server = MockServer::start().await;
    mount_rules_site(&server, json!([]), json!([])).await;

    let engine = Engine::bootstrap(firewall(&server), config()).await.unwrap();
    let source = DecisionSource::from_config(&source_config(&lapi)).unwrap();

    let err = run_bouncer(engine, source, SyncConfig::default(), CancellationToken::new())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }), "got: {err:?}");
}

// ── Session handling ────────────────────────────────────────────────

fn password_config(server: &MockServer) -> ControllerConfig {
    ControllerConfig {
        url: Url::parse(&server.uri()).unwrap(),
        auth: AuthCredentials::Credentials {
            username: "bouncer".into(),
            password: "hunter2".to_string().into(),
        },
        site: "default".into(),
        tls: TlsVerification::SystemDefaults,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_expired_session_is_renewed_once() {
    let server = MockServer::start().await;

    // No UniFi OS login route: classic controller.
    Mock::given(method("GET"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_partial_json(json!({ "username": "bouncer", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_rules_site(&server, json!([]), json!([])).await;

    let firewall = UnifiFirewall::connect(&password_config(&server)).await.unwrap();
    let engine = Engine::bootstrap(firewall, config()).await.unwrap();
    assert!(!engine.zone_based());
}

#[tokio::test]
async fn test_api_key_rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(site_path("rest/firewallgroup")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(v2_path("firewall/zone")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = Engine::bootstrap(firewall(&server), config())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_close_logs_out_password_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let firewall = UnifiFirewall::connect(&password_config(&server)).await.unwrap();
    firewall.close().await.unwrap();
}
