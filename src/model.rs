use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::features::N_FEATURES;

pub const MODEL_FILE: &str = "lasso_cv_model.json";
pub const SCALER_FILE: &str = "scaler.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{what} has {got} columns, expected {expected}")]
    Shape {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("{0} contains non-finite values")]
    NonFinite(&'static str),
    #[error("probe prediction failed: {0}")]
    Probe(#[from] PredictError),
}

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    Width { got: usize, expected: usize },
    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

/// Per-column standardisation fitted alongside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, PredictError> {
        check_width(x, self.width())?;
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| {
                // constant columns are stored with zero spread; leave them centred only
                let s = if *s == 0.0 { 1.0 } else { *s };
                (v - m) / s
            })
            .collect())
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        expect_width("scaler mean", self.mean.len())?;
        expect_width("scaler scale", self.scale.len())?;
        if !self.mean.iter().chain(&self.scale).all(|v| v.is_finite()) {
            return Err(ArtifactError::NonFinite("scaler"));
        }
        Ok(())
    }
}

/// Exported linear regressor: `intercept + coef · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

fn default_kind() -> String {
    "LinearModel".to_string()
}

impl LinearModel {
    pub fn predict(&self, x: &[f64]) -> Result<f64, PredictError> {
        check_width(x, self.coef.len())?;
        let y = self.intercept + x.iter().zip(&self.coef).map(|(a, b)| a * b).sum::<f64>();
        if !y.is_finite() {
            return Err(PredictError::NonFinite(y));
        }
        Ok(y)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        expect_width("model coef", self.coef.len())?;
        if !self.intercept.is_finite() || !self.coef.iter().all(|v| v.is_finite()) {
            return Err(ArtifactError::NonFinite("model"));
        }
        Ok(())
    }
}

fn check_width(x: &[f64], expected: usize) -> Result<(), PredictError> {
    if x.len() != expected {
        return Err(PredictError::Width {
            got: x.len(),
            expected,
        });
    }
    Ok(())
}

fn expect_width(what: &'static str, got: usize) -> Result<(), ArtifactError> {
    if got != N_FEATURES {
        return Err(ArtifactError::Shape {
            what,
            got,
            expected: N_FEATURES,
        });
    }
    Ok(())
}

/// A scaler and the model fitted on its output. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPair {
    pub scaler: StandardScaler,
    pub model: LinearModel,
}

impl ArtifactPair {
    /// Load and verify one candidate pair. The scaler is read first, then the model.
    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self, ArtifactError> {
        let scaler: StandardScaler = read_json(scaler_path)?;
        let model: LinearModel = read_json(model_path)?;
        let pair = Self { scaler, model };
        pair.verify()?;
        Ok(pair)
    }

    /// Shape checks plus a dummy forward on an all-zero row.
    pub fn verify(&self) -> Result<(), ArtifactError> {
        self.scaler.validate()?;
        self.model.validate()?;
        self.predict(&[0.0; N_FEATURES])?;
        Ok(())
    }

    /// Scale then predict. Returns the raw (unrounded) model output.
    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictError> {
        let scaled = self.scaler.transform(features)?;
        self.model.predict(&scaled)
    }

    /// Write both artifacts into `dir` under their standard file names.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(PathBuf, PathBuf), ArtifactError> {
        fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let scaler_path = dir.join(SCALER_FILE);
        let model_path = dir.join(MODEL_FILE);
        write_json(&scaler_path, &self.scaler)?;
        write_json(&model_path, &self.model)?;
        info!(scaler = %scaler_path.display(), model = %model_path.display(), "artifacts exported");
        Ok((model_path, scaler_path))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let txt = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&txt).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let txt = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, txt).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One (model, scaler) location to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl Candidate {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
        }
    }
}

/// `models/` next to the working directory, then the parent directory.
pub fn default_candidates() -> Vec<Candidate> {
    vec![Candidate::in_dir("models"), Candidate::in_dir("..")]
}

/// Try each candidate in order and keep the first pair that loads and verifies.
/// `None` means the service runs without models.
pub fn load_first(candidates: &[Candidate]) -> Option<ArtifactPair> {
    for c in candidates {
        match ArtifactPair::load(&c.model, &c.scaler) {
            Ok(pair) => {
                let resolved = fs::canonicalize(&c.model).unwrap_or_else(|_| c.model.clone());
                info!(path = %resolved.display(), "models loaded");
                info!(kind = %pair.model.kind, "model type");
                return Some(pair);
            }
            Err(ArtifactError::Missing(_)) => continue,
            Err(e) => {
                warn!(model = %c.model.display(), error = %e, "discarding invalid artifact pair");
            }
        }
    }
    warn!("model files not found; train and export the model first");
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Identity scaler with a simple model: fwi = 2 + 0.5 * Temperature - 0.1 * RH.
    pub(crate) fn sample_pair() -> ArtifactPair {
        ArtifactPair {
            scaler: StandardScaler {
                mean: vec![0.0; N_FEATURES],
                scale: vec![1.0; N_FEATURES],
            },
            model: LinearModel {
                kind: "LassoCV".into(),
                coef: vec![0.5, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                intercept: 2.0,
            },
        }
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            scale: vec![2.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        };
        let out = scaler.transform(&[14.0, 3.0, 7.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(out[0], 2.0);
        assert_eq!(out[1], 3.0);
        // zero scale only centres
        assert_eq!(out[2], 2.0);
    }

    #[test]
    fn test_width_mismatch() {
        let pair = sample_pair();
        assert_eq!(
            pair.predict(&[1.0, 2.0]),
            Err(PredictError::Width { got: 2, expected: 9 })
        );
    }

    #[test]
    fn test_pair_predict() {
        let pair = sample_pair();
        let mut x = [0.0; N_FEATURES];
        x[0] = 30.0;
        x[1] = 40.0;
        let y = pair.predict(&x).unwrap();
        assert!((y - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_output_is_error() {
        let mut pair = sample_pair();
        pair.model.intercept = 1e308;
        pair.model.coef[0] = 1e308;
        let mut x = [0.0; N_FEATURES];
        x[0] = 10.0;
        assert!(matches!(pair.predict(&x), Err(PredictError::NonFinite(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_shape() {
        let mut pair = sample_pair();
        pair.model.coef.pop();
        assert!(matches!(
            pair.verify(),
            Err(ArtifactError::Shape { what: "model coef", got: 8, expected: 9 })
        ));

        let mut pair = sample_pair();
        pair.scaler.scale[3] = f64::NAN;
        assert!(matches!(pair.verify(), Err(ArtifactError::NonFinite("scaler"))));
    }

    #[test]
    fn test_missing_kind_gets_default() {
        let m: LinearModel =
            serde_json::from_str(r#"{"coef":[0,0,0,0,0,0,0,0,0],"intercept":1.5}"#).unwrap();
        assert_eq!(m.kind, "LinearModel");
    }

    #[test]
    fn test_load_first_skips_missing_and_invalid() {
        let root = tempfile::tempdir().unwrap();
        let empty = root.path().join("empty");
        let broken = root.path().join("broken");
        let good = root.path().join("good");

        // broken: model file is not valid JSON
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(SCALER_FILE), "{\"mean\":[],\"scale\":[]}").unwrap();
        fs::write(broken.join(MODEL_FILE), "not json").unwrap();

        let pair = sample_pair();
        pair.save_to_dir(&good).unwrap();

        let candidates = vec![
            Candidate::in_dir(&empty),
            Candidate::in_dir(&broken),
            Candidate::in_dir(&good),
        ];
        assert_eq!(load_first(&candidates), Some(pair));
    }

    #[test]
    fn test_load_first_stops_at_first_valid() {
        let root = tempfile::tempdir().unwrap();
        let first = root.path().join("first");
        let second = root.path().join("second");

        let a = sample_pair();
        let mut b = sample_pair();
        b.model.intercept = 99.0;
        a.save_to_dir(&first).unwrap();
        b.save_to_dir(&second).unwrap();

        let loaded = load_first(&[Candidate::in_dir(&first), Candidate::in_dir(&second)]);
        assert_eq!(loaded, Some(a));
    }

    #[test]
    fn test_half_present_pair_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let pair = sample_pair();
        let (model_path, _) = pair.save_to_dir(root.path()).unwrap();
        fs::remove_file(&model_path).unwrap();

        assert!(matches!(
            ArtifactPair::load(&model_path, &root.path().join(SCALER_FILE)),
            Err(ArtifactError::Missing(p)) if p == model_path
        ));
        assert_eq!(load_first(&[Candidate::in_dir(root.path())]), None);
    }

    #[test]
    fn test_default_candidate_order() {
        let c = default_candidates();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].model, Path::new("models").join(MODEL_FILE));
        assert_eq!(c[0].scaler, Path::new("models").join(SCALER_FILE));
        assert_eq!(c[1].model, Path::new("..").join(MODEL_FILE));
    }
}
