//! Obtaining a usable model at startup, by loading or by training.

use crate::error::ModelError;
use crate::model::{ColdRiskModel, TrainingParams, TrainingSet};
use crate::schema::{Column, FeatureSchema};
use linfa::Dataset;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::Path;
use std::time::SystemTime;
use tracing::{info, warn};

/// Header of the label column in training CSVs.
pub const LABEL_COLUMN: &str = "Label";

/// Loads the model at `model_path` if it exists, otherwise fits one on
/// synthetic data and persists it there.
pub fn obtain_model(model_path: &Path, params: &TrainingParams) -> Result<ColdRiskModel, ModelError> {
    if model_path.exists() {
        info!("📦 Loading model from {:?}", model_path);
        let model = ColdRiskModel::load_from_file(model_path)?;
        info!(features = ?model.feature_names(), "Model loaded");
        Ok(model)
    } else {
        info!("🧠 Training model on synthetic data (no model at {:?})", model_path);
        train_and_save(model_path, &synthesize_training_set(params), params)
    }
}

/// Load a saved model if up-to-date, or retrain if the CSV is newer.
pub fn load_or_train_if_stale(
    model_path: &Path,
    csv_path: &Path,
    params: &TrainingParams,
) -> Result<ColdRiskModel, ModelError> {
    let model_mtime = model_path
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let csv_mtime = csv_path
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let should_retrain = !model_path.exists() || csv_mtime > model_mtime;

    if should_retrain {
        info!("🧠 Training model from {:?} (CSV is newer or model missing)", csv_path);
        let dataset = read_training_csv(csv_path)?;
        train_and_save(model_path, &dataset, params)
    } else {
        obtain_model(model_path, params)
    }
}

/// Startup entry point: prefers a configured training CSV, falls back to
/// [`obtain_model`].
pub fn provision(
    model_path: &Path,
    data_path: Option<&Path>,
    params: &TrainingParams,
) -> Result<ColdRiskModel, ModelError> {
    match data_path {
        Some(csv) if csv.exists() => load_or_train_if_stale(model_path, csv, params),
        Some(csv) => {
            warn!("Training data {:?} not found, ignoring it", csv);
            obtain_model(model_path, params)
        }
        None => obtain_model(model_path, params),
    }
}

/// Fits a fresh model regardless of what is on disk and overwrites the artifact.
/// A configured CSV that does not exist falls back to synthetic data, as in
/// [`provision`].
pub fn retrain(
    model_path: &Path,
    data_path: Option<&Path>,
    params: &TrainingParams,
) -> Result<ColdRiskModel, ModelError> {
    let dataset = match data_path {
        Some(csv) if csv.exists() => read_training_csv(csv)?,
        Some(csv) => {
            warn!("Training data {:?} not found, ignoring it", csv);
            synthesize_training_set(params)
        }
        None => synthesize_training_set(params),
    };
    train_and_save(model_path, &dataset, params)
}

fn train_and_save(
    model_path: &Path,
    dataset: &TrainingSet,
    params: &TrainingParams,
) -> Result<ColdRiskModel, ModelError> {
    let model = ColdRiskModel::train(dataset, params)?;
    let accuracy = model.evaluate_on(dataset);
    info!(
        samples = dataset.records().nrows(),
        "✅ Training accuracy: {:.2}%",
        accuracy * 100.0
    );

    info!("💾 Saving model to {:?}", model_path);
    model.save_to_file(model_path)?;
    info!(features = ?model.feature_names(), "New model trained and saved");
    Ok(model)
}

fn draw(column: Column, rng: &mut impl Rng) -> f64 {
    match column {
        Column::Age => rng.random_range(1..80) as f64,
        Column::Temperature => rng.random_range(-10.0..40.0),
        Column::Humidity => rng.random_range(0.0..100.0),
        Column::AirQualityIndex => rng.random_range(0..500) as f64,
        _ => {
            if rng.random_bool(0.5) {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Random labelled samples over the canonical schema.
///
/// Indicators are independent coin flips, so rows may set several (or no)
/// columns of a group. Labels are independent of the features.
pub fn synthesize_training_set(params: &TrainingParams) -> TrainingSet {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    let schema = FeatureSchema::canonical();
    let records = Array2::from_shape_fn((params.samples, Column::COUNT), |(_, j)| {
        draw(Column::ALL[j], &mut rng)
    });
    let targets = Array1::from_shape_fn(params.samples, |_| rng.random_range(0..2usize));

    Dataset::new(records, targets).with_feature_names(schema.names().to_vec())
}

/// Reads a training CSV with one header per feature column plus [`LABEL_COLUMN`].
/// Feature columns keep the order they have in the file.
pub fn read_training_csv(path: &Path) -> Result<TrainingSet, ModelError> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers()?.clone();
    let label_idx = headers
        .iter()
        .position(|h| h == LABEL_COLUMN)
        .ok_or_else(|| ModelError::Dataset(format!("missing '{LABEL_COLUMN}' column")))?;
    let feature_idx: Vec<usize> = (0..headers.len()).filter(|&i| i != label_idx).collect();
    let names: Vec<String> = feature_idx.iter().map(|&i| headers[i].to_string()).collect();

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let row = line + 2;

        for &i in &feature_idx {
            let cell = record.get(i).unwrap_or("").trim();
            let value: f64 = cell.parse().map_err(|_| {
                ModelError::Dataset(format!("row {row}: {:?} is not a number in '{}'", cell, &headers[i]))
            })?;
            if !value.is_finite() {
                return Err(ModelError::Dataset(format!(
                    "row {row}: {:?} in '{}' is not finite",
                    cell, &headers[i]
                )));
            }
            values.push(value);
        }

        let label = match record.get(label_idx).map(str::trim) {
            Some("0") => 0,
            Some("1") => 1,
            other => {
                return Err(ModelError::Dataset(format!(
                    "row {row}: label {:?} is not 0 or 1",
                    other.unwrap_or("")
                )));
            }
        };
        labels.push(label);
    }

    let records = Array2::from_shape_vec((labels.len(), feature_idx.len()), values)
        .map_err(|e| ModelError::Dataset(e.to_string()))?;

    Ok(Dataset::new(records, Array1::from_vec(labels)).with_feature_names(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn synthetic_set_shape_and_ranges() {
        let params = TrainingParams {
            seed: Some(11),
            ..TrainingParams::default()
        };
        let dataset = synthesize_training_set(&params);
        assert_eq!(dataset.records().dim(), (100, 13));
        assert_eq!(dataset.targets().len(), 100);
        assert_eq!(dataset.feature_names(), FeatureSchema::canonical().names());

        for row in dataset.records().rows() {
            for (j, &v) in row.iter().enumerate() {
                match Column::ALL[j] {
                    Column::Age => assert!((1.0..80.0).contains(&v) && v.fract() == 0.0),
                    Column::Temperature => assert!((-10.0..40.0).contains(&v)),
                    Column::Humidity => assert!((0.0..100.0).contains(&v)),
                    Column::AirQualityIndex => assert!((0.0..500.0).contains(&v) && v.fract() == 0.0),
                    _ => assert!(v == 0.0 || v == 1.0),
                }
            }
        }
        assert!(dataset.targets().iter().all(|&t| t <= 1));
    }

    #[test]
    fn seeded_synthesis_is_reproducible() {
        let params = TrainingParams {
            seed: Some(3),
            ..TrainingParams::default()
        };
        let a = synthesize_training_set(&params);
        let b = synthesize_training_set(&params);
        assert_eq!(a.records(), b.records());
        assert_eq!(a.targets(), b.targets());
    }

    #[test]
    fn reads_training_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Age,Label,Gender_Male,Temperature").unwrap();
        writeln!(file, "30,1,1,20.5").unwrap();
        writeln!(file, "41,0,0,-2").unwrap();
        drop(file);

        let dataset = read_training_csv(&path).unwrap();
        assert_eq!(dataset.feature_names(), vec!["Age", "Gender_Male", "Temperature"]);
        assert_eq!(dataset.records().row(0).to_vec(), vec![30.0, 1.0, 20.5]);
        assert_eq!(dataset.targets().to_vec(), vec![1, 0]);
    }

    #[test]
    fn rejects_bad_csv() {
        let dir = tempfile::tempdir().unwrap();

        let no_label = dir.path().join("no_label.csv");
        std::fs::write(&no_label, "Age,Humidity\n1,2\n").unwrap();
        assert!(matches!(read_training_csv(&no_label), Err(ModelError::Dataset(_))));

        let bad_label = dir.path().join("bad_label.csv");
        std::fs::write(&bad_label, "Age,Label\n1,yes\n").unwrap();
        assert!(matches!(read_training_csv(&bad_label), Err(ModelError::Dataset(_))));

        let bad_value = dir.path().join("bad_value.csv");
        std::fs::write(&bad_value, "Age,Label\nold,1\n").unwrap();
        assert!(matches!(read_training_csv(&bad_value), Err(ModelError::Dataset(_))));

        for cell in ["NaN", "inf", "-inf", "1e400"] {
            let not_finite = dir.path().join("not_finite.csv");
            std::fs::write(&not_finite, format!("Age,Label\n{cell},1\n1,0\n")).unwrap();
            match read_training_csv(&not_finite) {
                Err(ModelError::Dataset(msg)) => assert!(msg.contains("not finite"), "{msg}"),
                other => panic!("{cell} accepted: ok={}", other.is_ok()),
            }
        }
    }
}
