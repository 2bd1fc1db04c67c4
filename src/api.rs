use crate::error::AppError;
use crate::model::{ColdRiskModel, RiskAssessment};
use crate::schema::RiskFactors;
use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::debug;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ColdRiskModel>,
}

impl AppState {
    pub fn new(model: Arc<ColdRiskModel>) -> Self {
        Self { model }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub features: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: state.model.schema().len(),
    })
}

/// Raw form fields. Everything is optional so that a missing field becomes a
/// JSON error instead of an extractor rejection.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PredictForm {
    pub age: Option<String>,
    pub gender: Option<String>,
    pub genotype: Option<String>,
    pub blood_group: Option<String>,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub air_quality: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, AppError> {
    value.as_deref().ok_or(AppError::MissingField(field))
}

fn number<T: FromStr>(
    value: &Option<String>,
    field: &'static str,
    expected: &'static str,
) -> Result<T, AppError> {
    let raw = required(value, field)?;
    raw.trim().parse().map_err(|_| AppError::InvalidNumber {
        field,
        value: raw.to_string(),
        expected,
    })
}

impl PredictForm {
    pub fn to_risk_factors(&self) -> Result<RiskFactors, AppError> {
        Ok(RiskFactors::new(
            number(&self.age, "age", "integer")?,
            required(&self.gender, "gender")?,
            required(&self.genotype, "genotype")?,
            required(&self.blood_group, "blood_group")?,
            number(&self.temperature, "temperature", "number")?,
            number(&self.humidity, "humidity", "number")?,
            number(&self.air_quality, "air_quality", "integer")?,
        ))
    }
}

pub async fn predict(
    State(state): State<AppState>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> Result<Json<RiskAssessment>, AppError> {
    let Form(form) = form.map_err(|e| AppError::MalformedForm(e.body_text()))?;
    debug!(?form, "Received form data");

    let factors = form.to_risk_factors()?;
    Ok(Json(state.model.predict(&factors)))
}
