use serde::Serialize;
use std::fmt;

/// Fire risk tier derived from a (rounded) FWI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskLevel {
    /// Half-open bands: [..5), [5..15), [15..30), [30..50), [50..].
    pub fn from_fwi(fwi: f64) -> Self {
        if fwi < 5.0 {
            RiskLevel::VeryLow
        } else if fwi < 15.0 {
            RiskLevel::Low
        } else if fwi < 30.0 {
            RiskLevel::Moderate
        } else if fwi < 50.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
