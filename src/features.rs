use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Model input width.
pub const N_FEATURES: usize = 9;

/// Authoritative input order. Must match the column order the scaler and
/// model were fitted on.
pub const FEATURE_ORDER: [&str; N_FEATURES] = [
    "Temperature",
    "RH",
    "Ws",
    "Rain",
    "FFMC",
    "DMC",
    "ISI",
    "Classes",
    "Region",
];

/// The model predicts FWI, not the fire class, so this slot is pinned to 0.
pub const CLASSES_FIELD: &str = "Classes";

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("could not convert {field} to float: {raw:?}")]
    NotNumeric { field: String, raw: String },
    #[error("{field} must be a number or numeric string, got {kind}")]
    WrongType { field: String, kind: &'static str },
}

// ---------- Feature ordering utility ----------

/// Map a flat JSON object onto the fixed model order. Missing keys become 0.
pub fn order_from_json(body: &Value) -> Result<[f64; N_FEATURES], FeatureError> {
    let map = body.as_object().ok_or(FeatureError::NotAnObject)?;
    let mut v = [0.0; N_FEATURES];
    for (slot, name) in v.iter_mut().zip(FEATURE_ORDER) {
        if name == CLASSES_FIELD {
            continue;
        }
        *slot = coerce_field(map, name)?;
    }
    Ok(v)
}

fn coerce_field(map: &Map<String, Value>, name: &str) -> Result<f64, FeatureError> {
    let Some(value) = map.get(name) else {
        return Ok(0.0);
    };
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| FeatureError::NotNumeric {
            field: name.to_string(),
            raw: n.to_string(),
        }),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| FeatureError::NotNumeric {
            field: name.to_string(),
            raw: s.clone(),
        }),
        Value::Null => Err(wrong_type(name, "null")),
        Value::Array(_) => Err(wrong_type(name, "array")),
        Value::Object(_) => Err(wrong_type(name, "object")),
    }
}

fn wrong_type(field: &str, kind: &'static str) -> FeatureError {
    FeatureError::WrongType {
        field: field.to_string(),
        kind,
    }
}

// ---------- Declared feature catalog ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Integer,
    Float,
}

/// Form metadata for a single input. Ranges are advisory; prediction does
/// not enforce them.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureInfo {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub min: i64,
    pub max: i64,
    pub description: &'static str,
}

const CATALOG: [(&str, FeatureKind, i64, i64, &str); 11] = [
    ("Region", FeatureKind::Integer, 0, 1, "Region (0 or 1)"),
    ("FFMC", FeatureKind::Float, 0, 100, "Fine Fuel Moisture Code"),
    ("DMC", FeatureKind::Float, 0, 300, "Duff Moisture Code"),
    ("DC", FeatureKind::Float, 0, 1000, "Drought Code"),
    ("ISI", FeatureKind::Float, 0, 60, "Initial Spread Index"),
    ("BUI", FeatureKind::Float, 0, 300, "Buildup Index"),
    ("FWI", FeatureKind::Float, 0, 100, "Fire Weather Index"),
    ("Rain", FeatureKind::Float, 0, 100, "Rainfall (mm)"),
    ("Temperature", FeatureKind::Integer, 2, 40, "Temperature (°C)"),
    ("RH", FeatureKind::Integer, 15, 100, "Relative Humidity (%)"),
    ("Ws", FeatureKind::Integer, 0, 40, "Wind Speed (km/h)"),
];

pub fn feature_catalog() -> BTreeMap<&'static str, FeatureInfo> {
    CATALOG
        .iter()
        .map(|&(name, kind, min, max, description)| {
            (
                name,
                FeatureInfo {
                    kind,
                    min,
                    max,
                    description,
                },
            )
        })
        .collect()
}
