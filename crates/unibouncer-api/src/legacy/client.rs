// UniFi controller HTTP client
//
// Site-scoped URL construction for the `rest/` and v2 surfaces, CSRF
// bookkeeping, and response decoding. Endpoints live next door as inherent
// methods (`firewall.rs`, `zones.rs`, `auth.rs`).

use std::sync::{PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::ControllerPlatform;
use crate::error::{Error, body_preview};
use crate::legacy::models::LegacyResponse;
use crate::transport::TransportConfig;

/// Error body UniFi OS returns with HTTP 200 from the proxied `rest/` paths.
#[derive(Deserialize)]
struct ProxyError {
    error: Option<ProxyErrorDetail>,
}

#[derive(Deserialize)]
struct ProxyErrorDetail {
    code: u16,
    message: Option<String>,
}

/// HTTP client for one site of a UniFi Network application.
///
/// Covers the `rest/` namespace (wrapped in a `{ meta, data }` envelope)
/// and the v2 namespace (bare JSON). Safe to share across tasks.
pub struct LegacyClient {
    http: reqwest::Client,
    base_url: Url,
    site: String,
    platform: ControllerPlatform,
    /// Sent with every write. Set at login and replaced whenever a
    /// response carries a newer one.
    csrf_token: RwLock<Option<String>>,
}

impl LegacyClient {
    /// Client for username/password sessions. Call [`Self::login`] before
    /// anything else. `base_url` is the controller root, e.g.
    /// `https://192.168.1.1` (UniFi OS) or `https://controller:8443`.
    pub fn new(
        base_url: Url,
        site: String,
        platform: ControllerPlatform,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.session_client()?;
        Ok(Self::with_client(http, base_url, site, platform))
    }

    /// Client that authenticates every request with a local API key
    /// (`X-API-KEY`, UniFi OS with Network 9.0 or later).
    pub fn from_api_key(
        base_url: Url,
        site: String,
        platform: ControllerPlatform,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut key = HeaderValue::from_str(api_key.expose_secret()).map_err(|e| {
            Error::Authentication {
                message: format!("API key is not a valid header value: {e}"),
            }
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("X-API-KEY", key);
        let http = transport.client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url, site, platform))
    }

    /// Wrap a caller-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        site: String,
        platform: ControllerPlatform,
    ) -> Self {
        Self {
            http,
            base_url,
            site,
            platform,
            csrf_token: RwLock::new(None),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn platform(&self) -> ControllerPlatform {
        self.platform
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── CSRF ─────────────────────────────────────────────────────────

    pub(crate) fn set_csrf_token(&self, token: String) {
        trace!("CSRF token updated");
        *self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn csrf_token(&self) -> Option<String> {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── URLs ─────────────────────────────────────────────────────────

    /// `{base}{platform prefix}{rest}`. Built by string concatenation
    /// because `Url::join` would drop the prefix.
    fn network_url(&self, rest: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let prefix = self.platform.network_prefix();
        Ok(Url::parse(&format!("{base}{prefix}{rest}"))?)
    }

    /// `.../api/s/{site}/{path}`
    pub(crate) fn site_url(&self, path: &str) -> Result<Url, Error> {
        self.network_url(&format!("/api/s/{}/{path}", self.site))
    }

    /// `.../v2/api/site/{site}/{path}`
    pub(crate) fn v2_url(&self, path: &str) -> Result<Url, Error> {
        self.network_url(&format!("/v2/api/site/{}/{path}", self.site))
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Start a request. Anything but a GET carries the CSRF token.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "controller request");
        let write = method != Method::GET;
        let builder = self.http.request(method, url);
        match self.csrf_token() {
            Some(token) if write => builder.header("X-CSRF-Token", token),
            _ => builder,
        }
    }

    /// Send a `rest/` request and unwrap the `{ meta, data }` envelope.
    pub(crate) async fn send_legacy<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<T>, Error> {
        let (status, body) = self.read(builder).await?;

        if status == StatusCode::FORBIDDEN {
            return Err(Error::LegacyApi {
                message: "insufficient permissions (HTTP 403)".into(),
            });
        }
        if !status.is_success() {
            return Err(Error::LegacyApi {
                message: format!("HTTP {status}: {}", body_preview(&body)),
            });
        }

        if let Ok(ProxyError {
            error: Some(detail),
        }) = serde_json::from_str(&body)
        {
            return Err(match detail.code {
                401 => Error::SessionExpired,
                code => Error::LegacyApi {
                    message: format!(
                        "UniFi OS error {code}: {}",
                        detail.message.unwrap_or_default()
                    ),
                },
            });
        }

        let envelope: LegacyResponse<T> = decode(&body)?;
        if envelope.meta.rc == "ok" {
            Ok(envelope.data)
        } else {
            Err(Error::LegacyApi {
                message: envelope
                    .meta
                    .msg
                    .unwrap_or_else(|| format!("rc={}", envelope.meta.rc)),
            })
        }
    }

    /// Send a v2 request and decode the bare body.
    pub(crate) async fn send_v2<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, Error> {
        let (status, body) = self.read(builder).await?;

        if !status.is_success() {
            return Err(Error::V2Api {
                status: status.as_u16(),
                message: body_preview(&body).to_owned(),
            });
        }
        // batch-reorder answers 200 with an empty body.
        decode(if body.trim().is_empty() { "null" } else { body.as_str() })
    }

    /// Send, pick up a rotated CSRF token, and read the body. A 401 means
    /// the session (or API key) is no longer accepted.
    async fn read(&self, builder: RequestBuilder) -> Result<(StatusCode, String), Error> {
        let resp = builder.send().await?;
        if let Some(token) = csrf_header(resp.headers()) {
            self.set_csrf_token(token);
        }

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        Ok((status, resp.text().await?))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", body_preview(body)),
        body: body.to_owned(),
    })
}

/// CSRF token from a response, preferring a rotated value.
pub(crate) fn csrf_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Updated-CSRF-Token")
        .or_else(|| headers.get("X-CSRF-Token"))
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
