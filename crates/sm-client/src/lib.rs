//! # sm-client
//!
//! Typed access to the two remote collaborators: the campaign service
//! (workstations, templates, optimizers, objectives, constraints,
//! campaigns, observations) and the file-exchange service used by the
//! file-based suggestion transport.
//!
//! The capability surface lives in the [`CampaignApi`] and [`ExchangeApi`]
//! traits so sessions can run against the HTTP implementation or an
//! in-memory stand-in.

mod api;
mod http;
mod wire;

pub use api::{CampaignApi, ExchangeApi};
pub use http::{HttpClient, HttpClientConfig};
pub use wire::*;
