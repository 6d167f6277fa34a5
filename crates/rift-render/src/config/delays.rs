//! Server-wide response delays.

use crate::stub::DelayDistribution;
use serde::{Deserialize, Serialize};

/// Delays applied when a response definition does not set its own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DelaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_distribution: Option<DelayDistribution>,
}
