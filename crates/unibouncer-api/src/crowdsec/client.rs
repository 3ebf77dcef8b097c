// CrowdSec LAPI HTTP client
//
// Auth: `X-Api-Key` header carrying the bouncer key registered with
// `cscli bouncers add`.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::crowdsec::models::LapiStreamResponse;
use crate::error::{Error, body_preview};
use crate::transport::TransportConfig;

/// Async client for the CrowdSec Local API decision stream.
pub struct LapiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl LapiClient {
    /// Build from a bouncer API key and transport config.
    pub fn new(
        base_url: Url,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid LAPI key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert("X-Api-Key", key_value);

        let http = transport.client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        // `join` drops the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    /// The LAPI base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Pull decisions from `GET /v1/decisions/stream`.
    ///
    /// With `startup = true` the LAPI returns every active decision;
    /// afterwards only the delta since the previous pull. Empty `origins`
    /// or `scopes` leave the corresponding filter off.
    pub async fn stream(
        &self,
        startup: bool,
        origins: &[String],
        scopes: &[String],
    ) -> Result<LapiStreamResponse, Error> {
        let mut url = self.base_url.join("v1/decisions/stream")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("startup", if startup { "true" } else { "false" });
            if !origins.is_empty() {
                query.append_pair("origins", &origins.join(","));
            }
            if !scopes.is_empty() {
                query.append_pair("scopes", &scopes.join(","));
            }
        }
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(Error::Authentication {
                message: "LAPI rejected the bouncer API key".into(),
            });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Lapi {
                status: status.as_u16(),
                message: body_preview(&body).to_owned(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", body_preview(&body)),
            body: body.clone(),
        })
    }
}
