//! # sm-session
//!
//! Drives one optimization session against the remote service: the
//! idempotent provisioning chain (workstation, template, campaign) and
//! the suggestion/measurement exchange loop on top of it.
//!
//! Callers normally enter through [`initialize_optimization`], which
//! builds the process-wide configuration, provisions the remote
//! artifacts, and returns an [`OptimizationSession`] bound to an active
//! campaign.

mod provision;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use provision::{ProvisionState, ProvisionedCampaign, Provisioner};
pub use session::{initialize_optimization, InitOptions, OptimizationSession};
pub use transport::{
    DirectTransport, FileExchangeTransport, SessionContext, SuggestionTransport,
    DEFAULT_FETCH_RETRIES, DEFAULT_FETCH_SLEEP,
};
