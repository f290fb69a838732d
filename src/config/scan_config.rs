use serde::{Deserialize, Serialize};

use crate::core::bluetooth::types::ScanMode;

/// Scan settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Duty cycle requested from the radio when discovery starts.
    pub scan_mode: ScanMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            scan_mode: ScanMode::LowLatency,
        }
    }
}
