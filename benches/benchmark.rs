use cold_risk::{ColdRiskModel, RiskFactors, TrainingParams, synthesize_training_set};
use criterion::{Criterion, criterion_group, criterion_main};

fn trained_model() -> ColdRiskModel {
    let params = TrainingParams {
        seed: Some(42),
        ..TrainingParams::default()
    };
    ColdRiskModel::train(&synthesize_training_set(&params), &params).expect("training failed")
}

fn bench_predict_single(c: &mut Criterion) {
    let model = trained_model();
    let factors = RiskFactors::new(25, "Male", "AA", "O", 22.0, 50.0, 40);

    c.bench_function("predict reference request", |b| {
        b.iter(|| {
            let _ = model.predict(&factors);
        })
    });
}

fn bench_bulk_prediction(c: &mut Criterion) {
    let model = trained_model();
    let genders = ["Male", "Female"];
    let genotypes = ["AA", "AS", "SS"];
    let groups = ["A", "B", "AB", "O"];
    let requests: Vec<RiskFactors> = (0..10_000)
        .map(|i| {
            RiskFactors::new(
                (i % 79 + 1) as i64,
                genders[i % 2],
                genotypes[i % 3],
                groups[i % 4],
                (i % 50) as f64 - 10.0,
                (i % 100) as f64,
                (i % 500) as i64,
            )
        })
        .collect();

    c.bench_function("bulk predict 10k requests", |b| {
        b.iter(|| {
            for factors in &requests {
                let _ = model.predict(factors);
            }
        });
    });
}

criterion_group!(benches, bench_predict_single, bench_bulk_prediction);
criterion_main!(benches);
