//! Boosted-tree cold risk classifier and its on-disk form.

use crate::error::ModelError;
use crate::schema::{FeatureSchema, RiskFactors};
use gbdt::config::Config as BoosterConfig;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use linfa::Dataset;
use ndarray::{ArrayView1, Ix1};
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Feature matrix plus 0/1 labels, with column names matching a [`FeatureSchema`].
pub type TrainingSet = Dataset<f64, usize, Ix1>;

static LABEL_HIGH: &str = "High risk of catching a cold ❌";
static LABEL_LOW: &str = "Low risk of catching a cold ✅";

/// Hyper-parameters for fitting the booster and sizing synthetic data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub samples: usize,
    pub iterations: usize,
    pub max_depth: u32,
    pub shrinkage: f32,
    pub seed: Option<u64>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        TrainingParams {
            samples: 100,
            iterations: 100,
            max_depth: 6,
            shrinkage: 0.3,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    pub fn from_label(label: usize) -> Self {
        if label == 1 { RiskLevel::High } else { RiskLevel::Low }
    }

    pub fn message(self) -> &'static str {
        match self {
            RiskLevel::Low => LABEL_LOW,
            RiskLevel::High => LABEL_HIGH,
        }
    }
}

/// Human-readable prediction returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub prediction: String,
    pub confidence: String,
    pub details: String,
}

impl RiskAssessment {
    pub fn new(level: RiskLevel, p_low: f64, p_high: f64) -> Self {
        RiskAssessment {
            prediction: level.message().to_string(),
            confidence: format!("{:.1}%", p_low.max(p_high) * 100.0),
            details: format!(
                "Probability: {:.1}% risk, {:.1}% safe",
                p_high * 100.0,
                p_low * 100.0
            ),
        }
    }
}

/// Trained classifier together with the column order it expects.
#[derive(Serialize, Deserialize)]
pub struct ColdRiskModel {
    schema: FeatureSchema,
    booster: GBDT,
}

impl ColdRiskModel {
    /// Fits a booster on `dataset`. The dataset's feature names become the
    /// model's schema, so they must be set.
    pub fn train(dataset: &TrainingSet, params: &TrainingParams) -> Result<Self, ModelError> {
        let records = dataset.records();
        let targets = dataset.targets();

        if records.nrows() == 0 {
            return Err(ModelError::Dataset("training set is empty".into()));
        }
        if params.iterations == 0 {
            return Err(ModelError::Dataset("at least one boosting iteration is required".into()));
        }
        if let Some(bad) = targets.iter().find(|&&t| t > 1) {
            return Err(ModelError::Dataset(format!("label {bad} is not 0 or 1")));
        }

        // The booster works in f32, so values must stay finite after narrowing.
        if let Some((row, _)) = records
            .rows()
            .into_iter()
            .enumerate()
            .find(|(_, r)| r.iter().any(|&v| !(v as f32).is_finite()))
        {
            return Err(ModelError::Dataset(format!("row {row} has a value that is not finite")));
        }

        let schema = FeatureSchema::new(dataset.feature_names());
        if schema.columns().all(|c| c.is_none()) {
            return Err(ModelError::Dataset("no recognised feature columns".into()));
        }
        if schema.len() != records.ncols() {
            return Err(ModelError::Dataset(format!(
                "{} feature names for {} columns",
                schema.len(),
                records.ncols()
            )));
        }

        // Log-likelihood loss expects labels in {-1, 1}.
        let mut data: DataVec = records
            .rows()
            .into_iter()
            .zip(targets.iter())
            .map(|(row, &label)| {
                let label = if label == 1 { 1.0 } else { -1.0 };
                Data::new_training_data(to_booster_row(row), 1.0, label, None)
            })
            .collect();

        let mut cfg = BoosterConfig::new();
        cfg.set_feature_size(schema.len());
        cfg.set_max_depth(params.max_depth);
        cfg.set_iterations(params.iterations);
        cfg.set_shrinkage(params.shrinkage);
        cfg.set_loss("LogLikelyhood");
        cfg.set_debug(false);

        let mut booster = GBDT::new(&cfg);
        booster.fit(&mut data);

        Ok(ColdRiskModel { schema, booster })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> &[String] {
        self.schema.names()
    }

    /// Class probabilities `(p_low, p_high)` for a vector already in schema order.
    pub fn predict_proba(&self, features: ArrayView1<f64>) -> (f64, f64) {
        let input = vec![Data::new_test_data(to_booster_row(features), None)];
        let p_high = self
            .booster
            .predict(&input)
            .first()
            .map(|&p| f64::from(p))
            .filter(|p| p.is_finite())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        (1.0 - p_high, p_high)
    }

    /// Encodes `factors` and returns the predicted level with both class probabilities.
    pub fn predict_with_proba(&self, factors: &RiskFactors) -> (RiskLevel, f64, f64) {
        let row = self.schema.encode(factors);
        debug!(features = ?row.to_vec(), "encoded input");

        let (p_low, p_high) = self.predict_proba(row.view());
        let level = if p_high > 0.5 {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };
        (level, p_low, p_high)
    }

    pub fn predict(&self, factors: &RiskFactors) -> RiskAssessment {
        let (level, p_low, p_high) = self.predict_with_proba(factors);
        RiskAssessment::new(level, p_low, p_high)
    }

    /// Fraction of rows whose predicted label matches the dataset's label.
    pub fn evaluate_on(&self, dataset: &TrainingSet) -> f64 {
        let total = dataset.records().nrows();
        if total == 0 {
            return 0.0;
        }

        let correct = dataset
            .records()
            .rows()
            .into_iter()
            .zip(dataset.targets().iter())
            .filter(|(row, label)| {
                let (_, p_high) = self.predict_proba(row.view());
                RiskLevel::from_label(**label) == RiskLevel::from_label((p_high > 0.5) as usize)
            })
            .count();

        correct as f64 / total as f64
    }

    /// Saves the model to a binary `.msgpack` file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        // Written beside the target and renamed, so a failed write never
        // leaves a truncated artifact behind.
        let tmp = temp_sibling(path);
        let written = self.write_to(&tmp);
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Loads the model from a binary `.msgpack` file.
    pub fn load_from_file(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(from_read(reader)?)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn to_booster_row(row: ArrayView1<f64>) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::synthesize_training_set;
    use crate::schema::Column;
    use ndarray::{Array1, Array2};

    fn seeded() -> TrainingParams {
        TrainingParams {
            iterations: 10,
            seed: Some(7),
            ..TrainingParams::default()
        }
    }

    #[test]
    fn reference_prediction_is_well_formed() {
        let model = ColdRiskModel::train(&synthesize_training_set(&seeded()), &seeded()).unwrap();
        let factors = RiskFactors::new(25, "Male", "AA", "O", 22.0, 50.0, 40);
        let assessment = model.predict(&factors);

        let prediction = assessment.prediction.to_lowercase();
        assert!(prediction.contains("high risk") || prediction.contains("low risk"));

        let pct: f64 = assessment.confidence.trim_end_matches('%').parse().unwrap();
        assert!(assessment.confidence.ends_with('%'));
        assert!((50.0..=100.0).contains(&pct), "confidence {pct}");
        assert!(assessment.details.starts_with("Probability: "));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let model = ColdRiskModel::train(&synthesize_training_set(&seeded()), &seeded()).unwrap();
        let row = model
            .schema()
            .encode(&RiskFactors::new(60, "Female", "SS", "AB", -3.5, 90.0, 300));
        let (p_low, p_high) = model.predict_proba(row.view());
        assert!((0.0..=1.0).contains(&p_high));
        assert!((p_low + p_high - 1.0).abs() < 1e-9);
    }

    #[test]
    fn assessment_formatting() {
        let a = RiskAssessment::new(RiskLevel::High, 0.25, 0.75);
        assert_eq!(a.prediction, "High risk of catching a cold ❌");
        assert_eq!(a.confidence, "75.0%");
        assert_eq!(a.details, "Probability: 75.0% risk, 25.0% safe");

        let a = RiskAssessment::new(RiskLevel::Low, 1.0, 0.0);
        assert_eq!(a.prediction, "Low risk of catching a cold ✅");
        assert_eq!(a.confidence, "100.0%");
    }

    #[test]
    fn training_keeps_dataset_column_order() {
        let names: Vec<&str> = Column::ALL.iter().rev().map(|c| c.name()).collect();
        let records = Array2::from_shape_fn((8, 13), |(i, j)| ((i + j) % 2) as f64);
        let targets = Array1::from_shape_fn(8, |i| i % 2);
        let dataset = Dataset::new(records, targets).with_feature_names(names.clone());

        let model = ColdRiskModel::train(&dataset, &seeded()).unwrap();
        assert_eq!(model.feature_names(), names.as_slice());
        assert_eq!(model.schema().position(Column::BloodGroupO), Some(0));
    }

    #[test]
    fn rejects_bad_training_sets() {
        let empty = Dataset::new(Array2::<f64>::zeros((0, 13)), Array1::<usize>::zeros(0));
        assert!(matches!(
            ColdRiskModel::train(&empty, &seeded()),
            Err(ModelError::Dataset(_))
        ));

        let narrow = Dataset::new(Array2::<f64>::zeros((4, 3)), Array1::<usize>::zeros(4));
        assert!(matches!(
            ColdRiskModel::train(&narrow, &seeded()),
            Err(ModelError::Dataset(_))
        ));

        let labels = Dataset::new(Array2::<f64>::zeros((2, 13)), Array1::from_vec(vec![0, 2]));
        assert!(matches!(
            ColdRiskModel::train(&labels, &seeded()),
            Err(ModelError::Dataset(_))
        ));
    }

    #[test]
    fn rejects_values_that_overflow_the_booster() {
        let names: Vec<&str> = Column::ALL.iter().map(|c| c.name()).collect();
        for bad in [f64::NAN, f64::INFINITY, 1e300] {
            let mut records = Array2::<f64>::zeros((3, 13));
            records[[1, 4]] = bad;
            let dataset = Dataset::new(records, Array1::from_vec(vec![0, 1, 0]))
                .with_feature_names(names.clone());
            match ColdRiskModel::train(&dataset, &seeded()) {
                Err(ModelError::Dataset(msg)) => assert!(msg.contains("row 1"), "{msg}"),
                other => panic!("expected dataset error for {bad}, got ok={}", other.is_ok()),
            }
        }
    }

    #[test]
    fn failed_save_keeps_previous_artifact() {
        let params = seeded();
        let model = ColdRiskModel::train(&synthesize_training_set(&params), &params).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.msgpack");

        model.save_to_file(&path).unwrap();
        assert!(!dir.path().join("model.msgpack.tmp").exists());
        let saved = fs::read(&path).unwrap();

        // A directory in the way of the temporary file makes the write fail.
        fs::create_dir(dir.path().join("model.msgpack.tmp")).unwrap();
        assert!(matches!(model.save_to_file(&path), Err(ModelError::Io(_))));
        assert_eq!(fs::read(&path).unwrap(), saved);
        assert!(ColdRiskModel::load_from_file(&path).is_ok());
    }

    #[test]
    fn accuracy_is_a_fraction() {
        let params = seeded();
        let dataset = synthesize_training_set(&params);
        let model = ColdRiskModel::train(&dataset, &params).unwrap();
        let acc = model.evaluate_on(&dataset);
        assert!((0.0..=1.0).contains(&acc));
    }
}
