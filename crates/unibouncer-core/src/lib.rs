//! Synchronization engine between CrowdSec decisions and UniFi firewall
//! address groups.
//!
//! - **[`Engine`]** owns the [`BlockStore`] (address cache and group
//!   tracker) and the controller handle. [`Engine::process`] folds decision
//!   batches into the store; [`Engine::reconcile`] pushes dirty groups of one
//!   family.
//!
//! - **[`SyncLoop`]** drives the engine from a decision channel and flushes
//!   after a quiet period. [`run_bouncer`] pairs it with a
//!   [`DecisionSource`] under one cancellation token.
//!
//! - **[`FirewallController`]** is the seam to the controller;
//!   [`UnifiFirewall`] implements it for UniFi Network.

pub mod config;
pub mod engine;
pub mod error;
pub mod firewall;
pub mod model;
pub mod source;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    AuthCredentials, ControllerConfig, EngineConfig, FirewallMode, GroupSelection, SourceConfig,
    SyncConfig, TlsVerification, ZonePair,
};
pub use engine::{Engine, ProcessReport, ReconcileReport};
pub use error::CoreError;
pub use firewall::{FirewallController, UnifiFirewall};
pub use source::DecisionSource;
pub use store::BlockStore;
pub use sync::{SyncLoop, SyncState, run_bouncer};

pub use model::{BlockedAddress, Decision, DecisionAction, IpFamily};
