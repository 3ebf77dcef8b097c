// ── Decisions ──

use unibouncer_api::LapiDecision;

use super::address::BlockedAddress;
use super::family::IpFamily;

/// What a decision asks the firewall to do with its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    /// Start blocking.
    Add,
    /// Stop blocking (decision deleted or expired).
    Remove,
}

/// A block/unblock verdict for one address. Consumed once applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub address: BlockedAddress,
    pub origin: String,
    pub action: DecisionAction,
}

impl Decision {
    pub fn add(address: BlockedAddress, origin: impl Into<String>) -> Self {
        Self {
            address,
            origin: origin.into(),
            action: DecisionAction::Add,
        }
    }

    pub fn remove(address: BlockedAddress, origin: impl Into<String>) -> Self {
        Self {
            address,
            origin: origin.into(),
            action: DecisionAction::Remove,
        }
    }

    pub fn family(&self) -> IpFamily {
        self.address.family()
    }

    /// Convert a LAPI decision. Only `ban` decisions scoped to an IP or
    /// range are enforceable on an address group.
    pub fn from_lapi(raw: &LapiDecision, action: DecisionAction) -> Result<Self, SkippedDecision> {
        if !raw.kind.eq_ignore_ascii_case("ban") {
            return Err(SkippedDecision::UnsupportedType(raw.kind.clone()));
        }
        if !(raw.scope.eq_ignore_ascii_case("ip") || raw.scope.eq_ignore_ascii_case("range")) {
            return Err(SkippedDecision::UnsupportedScope(raw.scope.clone()));
        }
        let address = raw
            .value
            .parse::<BlockedAddress>()
            .map_err(|_| SkippedDecision::InvalidValue(raw.value.clone()))?;

        Ok(Self {
            address,
            origin: raw.origin.clone(),
            action,
        })
    }
}

/// Why a LAPI decision was not turned into a [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkippedDecision {
    #[error("unsupported decision type {0:?}")]
    UnsupportedType(String),
    #[error("unsupported scope {0:?}")]
    UnsupportedScope(String),
    #[error("malformed value {0:?}")]
    InvalidValue(String),
}
