// Controller sessions
//
// Username/password sessions live in the client's cookie jar plus the CSRF
// token captured at login. A bouncer runs for weeks, so callers are expected
// to log in again when a request reports `Error::SessionExpired`.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::auth::ControllerPlatform;
use crate::error::{Error, body_preview};
use crate::legacy::client::{LegacyClient, csrf_header};
use crate::transport::TransportConfig;

/// Probe order for platform detection. UniFi OS answers its login path
/// with 401/405; a classic controller has no such route.
const PLATFORM_PROBES: [ControllerPlatform; 2] = [
    ControllerPlatform::UnifiOs,
    ControllerPlatform::ClassicController,
];

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember: bool,
}

impl LegacyClient {
    /// Open a session. Replaces any previous session cookie and CSRF token.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.base_url().join(self.platform().login_path())?;
        debug!(%url, username, "opening controller session");

        let resp = self
            .http()
            .post(url)
            .json(&LoginRequest {
                username,
                password: password.expose_secret(),
                remember: true,
            })
            .send()
            .await?;

        let status = resp.status();
        if let Some(token) = csrf_header(resp.headers()) {
            self.set_csrf_token(token);
        }
        if status.is_success() {
            debug!("controller session established");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Authentication {
            message: format!("login rejected (HTTP {status}): {}", body_preview(&body)),
        })
    }

    /// Close the session. Best effort: the controller may already have
    /// dropped it.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.base_url().join(self.platform().logout_path())?;
        let status = self.request(Method::POST, url).send().await?.status();
        info!(%status, "controller session closed");
        Ok(())
    }

    /// Work out whether `base_url` is a UniFi OS console or a classic
    /// Network application by probing each platform's login route.
    pub async fn detect_platform(
        base_url: &Url,
        transport: &TransportConfig,
    ) -> Result<ControllerPlatform, Error> {
        let http = transport.build_client()?;

        let mut last_err = None;
        for platform in PLATFORM_PROBES {
            let url = base_url.join(platform.login_path())?;
            debug!(%url, ?platform, "probing controller platform");
            match http.get(url).send().await {
                Ok(resp) if resp.status() != reqwest::StatusCode::NOT_FOUND => {
                    return Ok(platform);
                }
                Ok(_) => last_err = None,
                Err(e) => last_err = Some(e),
            }
        }

        // A host that answers 404 everywhere is still a classic controller
        // with an unusual login route; a host that never answers is not.
        match last_err {
            Some(e) => Err(e.into()),
            None => Ok(ControllerPlatform::ClassicController),
        }
    }
}
