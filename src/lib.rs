//! # cold-risk 🤧
//!
//! Predict the risk of catching a cold from a handful of health and
//! environmental attributes using a gradient-boosted tree classifier.
//!
//! Age, temperature, humidity and air quality are used as-is; gender,
//! genotype and blood group are one-hot encoded into a fixed 13-column
//! [`FeatureSchema`]. The trained model remembers the column order it was
//! fitted on and always encodes requests in that order.
//!
//! ## Features
//! - Typed one-hot encoding (no string matching per request)
//! - Boosted-tree classifier via [`gbdt`](https://crates.io/crates/gbdt)
//! - Label + probability prediction
//! - Model persistence with `rmp-serde` (MessagePack)
//! - Synthetic bootstrap training, or training from a CSV with auto-retrain when it changes
//! - `POST /predict` form endpoint served with axum
//!
//! ## Example
//! ```rust
//! use cold_risk::{ColdRiskModel, RiskFactors, TrainingParams, synthesize_training_set};
//!
//! let params = TrainingParams { iterations: 5, seed: Some(1), ..TrainingParams::default() };
//! let model = ColdRiskModel::train(&synthesize_training_set(&params), &params).unwrap();
//!
//! let factors = RiskFactors::new(25, "Male", "AA", "O", 22.0, 50.0, 40);
//! let result = model.predict(&factors);
//! println!("{} ({} confidence)", result.prediction, result.confidence);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod provision;
pub mod schema;

pub use api::{AppState, build_router};
pub use error::{AppError, ModelError};
pub use model::{ColdRiskModel, RiskAssessment, RiskLevel, TrainingParams, TrainingSet};
pub use provision::{obtain_model, provision, retrain, synthesize_training_set};
pub use schema::{BloodGroup, Column, FeatureSchema, Gender, Genotype, RiskFactors};
