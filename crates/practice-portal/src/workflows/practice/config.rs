use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_AVERAGE: f64 = 4.0;

/// Tunables for the practice lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Passing threshold applied at closure when the caller does not supply one.
    pub default_min_average: f64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            default_min_average: DEFAULT_MIN_AVERAGE,
        }
    }
}
