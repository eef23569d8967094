//! Suggested parameter assignments and their measurement lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::parameter::ParamValue;

/// Opaque back-reference to the remote suggestion record. Needed when the
/// measured outcome is submitted; callers never inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionRef {
    /// A pending parameter artifact on the file exchange.
    ExchangeFile { file_id: String, file_name: String },
    /// A direct observation record keyed by its service reference.
    Observation { reference: String },
}

impl SuggestionRef {
    pub fn reference(&self) -> &str {
        match self {
            Self::ExchangeFile { file_id, .. } => file_id,
            Self::Observation { reference } => reference,
        }
    }
}

/// One suggested parameter assignment awaiting measurement.
///
/// `param_values` arrives in user units. The caller evaluates the
/// suggestion externally, fills `measurements` (keyed by objective name),
/// and hands the record back for submission, which retires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub iteration: u32,
    pub batch: u32,
    pub param_values: BTreeMap<String, ParamValue>,
    pub measurements: BTreeMap<String, f64>,
    pub source: SuggestionRef,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new(
        iteration: u32,
        batch: u32,
        param_values: BTreeMap<String, ParamValue>,
        source: SuggestionRef,
    ) -> Self {
        Self {
            iteration,
            batch,
            param_values,
            measurements: BTreeMap::new(),
            source,
            created_at: Utc::now(),
        }
    }

    /// Record a measured outcome for one objective.
    pub fn record_measurement(&mut self, objective: impl Into<String>, value: f64) {
        self.measurements.insert(objective.into(), value);
    }
}

/// Per-item result of a measurement submission. An accepted outcome is an
/// acknowledgment, not a guarantee of downstream acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub reference: String,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
