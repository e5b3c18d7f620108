//! Fleet-wide usage totals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Epoch milliseconds of the last totals reset.
    pub total_usage_reset_at: i64,
    pub total_usage: f64,
    pub total_usage_bytes: i64,
}
