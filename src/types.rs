use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Successful `/predict` response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionOut {
    pub success: bool,
    pub prediction: f64,
    pub fwi_value: f64,
    pub risk_level: String,
    pub message: String,
    pub risk_message: String,
}

impl PredictionOut {
    /// `fwi` is expected to be already rounded.
    pub fn new(fwi: f64, risk: RiskLevel) -> Self {
        // {:?} keeps a trailing ".0" on whole values, e.g. "3.0" rather than "3"
        Self {
            success: true,
            prediction: fwi,
            fwi_value: fwi,
            risk_level: risk.label().to_string(),
            message: format!("🔥 Predicted Fire Weather Index (FWI): {:?}", fwi),
            risk_message: format!("Risk Level: {}", risk),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

/// Round to two decimals from the exact binary value, so 14.995 (stored as
/// 14.99499..) stays 14.99. Scaling by 100 first would round it up.
pub fn round2(v: f64) -> f64 {
    format!("{:.2}", v).parse().unwrap_or(v)
}
