// CrowdSec Local API client modules
//
// Bouncer-side view of the LAPI: a single polling endpoint
// (`/v1/decisions/stream`) that hands out new and deleted decisions
// since the previous pull for this API key.

pub mod client;
pub mod models;

pub use client::LapiClient;
pub use models::{LapiDecision, LapiStreamResponse};
