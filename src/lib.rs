//! Serving layer for a pre-trained Fire Weather Index regressor.

pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod risk;
pub mod server;
pub mod types;

pub use config::Config;
pub use model::{load_first, ArtifactPair, Candidate, LinearModel, StandardScaler};
pub use server::{router, AppState};
