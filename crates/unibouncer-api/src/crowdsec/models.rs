// LAPI response types

use serde::{Deserialize, Serialize};

/// Body of `GET /v1/decisions/stream`.
///
/// Either list is `null` when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LapiStreamResponse {
    #[serde(default)]
    pub new: Option<Vec<LapiDecision>>,
    #[serde(default)]
    pub deleted: Option<Vec<LapiDecision>>,
}

impl LapiStreamResponse {
    /// True when the pull carried no decisions at all.
    pub fn is_empty(&self) -> bool {
        self.new.as_ref().is_none_or(Vec::is_empty)
            && self.deleted.as_ref().is_none_or(Vec::is_empty)
    }
}

/// A single decision as returned by the LAPI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapiDecision {
    #[serde(default)]
    pub id: Option<i64>,
    /// `crowdsec`, `cscli`, `CAPI`, `lists`, ...
    #[serde(default)]
    pub origin: String,
    /// `ban`, `captcha`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// `Ip` or `Range` (case varies across LAPI versions).
    #[serde(default)]
    pub scope: String,
    pub value: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
}
