//! Async clients for the UniFi controller firewall endpoints (legacy
//! `rest/` and v2) and the CrowdSec Local API decision stream.

pub mod auth;
pub mod crowdsec;
pub mod error;
pub mod legacy;
pub mod transport;

pub use auth::ControllerPlatform;
pub use crowdsec::{LapiClient, LapiDecision, LapiStreamResponse};
pub use error::Error;
pub use legacy::{
    FirewallZone, LegacyClient, LegacyFirewallGroup, LegacyFirewallRule, PolicyEndpoint,
    PolicyReorder, ZonePolicy,
};
pub use transport::{TlsMode, TransportConfig};
