use axum::{
    body::Bytes,
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::{any::Any, collections::BTreeMap, sync::Arc};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::{
    config::{Config, Mode},
    error::ApiError,
    features::{feature_catalog, order_from_json, FeatureInfo, FEATURE_ORDER},
    model::ArtifactPair,
    risk::RiskLevel,
    types::{round2, PredictionOut},
};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

// ---------- Server state ----------

/// Built once at start-up and shared read-only with every handler.
/// `artifacts == None` is the degraded "models not loaded" mode.
#[derive(Clone)]
pub struct AppState {
    pub artifacts: Option<Arc<ArtifactPair>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, artifacts: Option<ArtifactPair>) -> Self {
        Self {
            artifacts: artifacts.map(Arc::new),
            config: Arc::new(config),
        }
    }

    pub fn models_loaded(&self) -> bool {
        self.artifacts.is_some()
    }
}

pub fn router(state: AppState) -> Router {
    let app = Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/api/features", get(features))
        .fallback(not_found);
    with_layers(app).with_state(state)
}

/// Request tracing plus the panic → 500 envelope.
fn with_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

// ---------- Handlers ----------

async fn home(State(state): State<AppState>) -> Html<String> {
    Html(render_index(state.models_loaded(), state.config.mode))
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionOut>, ApiError> {
    let artifacts = state.artifacts.as_deref().ok_or(ApiError::ModelsNotLoaded)?;
    let payload: Value = serde_json::from_slice(&body).map_err(ApiError::bad_request)?;
    Ok(Json(predict_payload(artifacts, &payload)?))
}

async fn features() -> Json<BTreeMap<&'static str, FeatureInfo>> {
    Json(feature_catalog())
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "handler panicked");
    ApiError::Internal.into_response()
}

// ---------- Prediction pipeline ----------

/// Extract, scale, predict, round, classify.
pub fn predict_payload(artifacts: &ArtifactPair, payload: &Value) -> Result<PredictionOut, ApiError> {
    let features = order_from_json(payload).map_err(ApiError::bad_request)?;

    if tracing::enabled!(tracing::Level::DEBUG) {
        let sample: Vec<String> = FEATURE_ORDER
            .iter()
            .zip(features.iter())
            .map(|(name, v)| format!("{}={:.3}", name, v))
            .collect();
        debug!("features [{}]", sample.join(", "));
    }

    let raw = artifacts.predict(&features).map_err(ApiError::bad_request)?;
    let fwi = round2(raw);
    let risk = RiskLevel::from_fwi(fwi);
    debug!(raw, fwi, risk = %risk, "prediction");
    Ok(PredictionOut::new(fwi, risk))
}

pub fn render_index(models_loaded: bool, mode: Mode) -> String {
    let (class, status) = if models_loaded {
        ("ok", "Model loaded and ready.")
    } else {
        ("warn", "Models not loaded. Please train and export the model first.")
    };
    INDEX_TEMPLATE
        .replace("{{status_class}}", class)
        .replace("{{status}}", status)
        .replace("{{disabled}}", if models_loaded { "" } else { "disabled" })
        .replace("{{mode}}", mode.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_pair;
    use axum::{body::Body, http::{Request, StatusCode}};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("boom")
    }

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_panicking_route_returns_internal_error() {
        let app = with_layers(Router::new().route("/boom", get(boom)));
        let res = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(res).await,
            json!({ "error": "Internal server error" })
        );
    }

    #[tokio::test]
    async fn test_handle_panic_with_string_payload() {
        let res = handle_panic(Box::new(String::from("index out of bounds")));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_predict_payload() {
        let pair = sample_pair();
        // 2 + 0.5 * 29 - 0.1 * 57 = 10.8
        let out = predict_payload(&pair, &json!({ "Temperature": 29, "RH": 57 })).unwrap();
        assert_eq!(out.prediction, 10.8);
        assert_eq!(out.fwi_value, 10.8);
        assert_eq!(out.risk_level, "Low");
        assert!(out.success);
    }

    #[test]
    fn test_predict_payload_rounds() {
        let pair = sample_pair();
        // 2 + 0.5 * 10.123 = 7.0615
        let out = predict_payload(&pair, &json!({ "Temperature": 10.123 })).unwrap();
        assert_eq!(out.prediction, 7.06);
    }

    #[test]
    fn test_predict_payload_bad_input() {
        let pair = sample_pair();
        let err = predict_payload(&pair, &json!({ "RH": "humid" })).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("RH")));
    }

    #[test]
    fn test_render_index() {
        let up = render_index(true, Mode::Production);
        assert!(up.contains("Model loaded and ready."));
        assert!(up.contains("production"));
        assert!(!up.contains("{{"));

        let down = render_index(false, Mode::Development);
        assert!(down.contains("development"));
        assert!(down.contains("Models not loaded"));
        assert!(down.contains("disabled"));
    }
}
