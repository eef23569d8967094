//! Closed optimization loop against a live campaign.
//!
//! Reads the spec file given as the first argument (falling back to
//! `config/optimization_config.json`) and drives suggest/measure rounds
//! until the configured budget is spent. Measurements are random
//! stand-ins; a real workflow runs the experiment between fetch and
//! submit. Requires `SUMMIT_API_KEY` unless the spec carries a key.

use std::time::Duration;

use anyhow::Result;
use sm_session::{initialize_optimization, InitOptions};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let spec_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/optimization_config.json".to_string());

    let session = initialize_optimization(
        InitOptions::new()
            .with_spec_file_path(&spec_path)
            .with_inherit_data(true)
            .with_always_restart(true),
    )
    .await?;
    info!(
        session_id = %session.id(),
        campaign_id = session.campaign_id().unwrap_or("<none>"),
        "session established"
    );

    let budget = session.config().budget;
    let objectives = session.config().objective_names();
    for iteration in 1..=budget {
        let mut suggestions = session
            .get_new_suggestions(4, Duration::from_secs(15))
            .await?;
        info!(iteration, count = suggestions.len(), "new suggestions");

        for suggestion in &mut suggestions {
            for objective in &objectives {
                suggestion.record_measurement(objective, rand::random::<f64>());
            }
        }
        if !suggestions.is_empty() {
            let outcomes = session.send_measurements(suggestions).await?;
            let rejected = outcomes.iter().filter(|o| !o.accepted).count();
            info!(submitted = outcomes.len(), rejected, "measurements sent");
        }
    }
    Ok(())
}
