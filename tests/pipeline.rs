use approx::assert_abs_diff_eq;

use housing_eval::config::{EvaluationConfig, FailurePolicy};
use housing_eval::db::TableName;
use housing_eval::engine::memory::{record, Record};
use housing_eval::engine::InMemoryEngine;
use housing_eval::error::{EvalError, Stage};
use housing_eval::features::{FeatureColumn, FeatureVector};
use housing_eval::model::{ArtifactNames, Family, Link, ModelConfig};
use housing_eval::pipeline::ModelRunner;

fn train_table() -> TableName {
    "public.training_silver_halfdata".parse().unwrap()
}

fn test_table() -> TableName {
    "public.training_bronze".parse().unwrap()
}

/// saleprice = 3 * x + 7
fn linear_rows(ids: std::ops::Range<i32>) -> Vec<Record> {
    ids.map(|i| {
        let x = f64::from(i);
        record([
            ("id", Some(f64::from(i))),
            ("x", Some(x)),
            ("saleprice", Some(3.0 * x + 7.0)),
        ])
    })
    .collect()
}

fn config(models: Vec<ModelConfig>) -> EvaluationConfig {
    EvaluationConfig {
        train_table: train_table(),
        test_table: test_table(),
        features: FeatureVector::new(vec![FeatureColumn::new("x")], true),
        models,
        ..EvaluationConfig::default()
    }
}

fn engine() -> InMemoryEngine {
    let mut train = linear_rows(0..20);
    // NULL 특성은 0 으로, NULL 목표는 학습에서 제외
    train.push(record([("id", Some(100.0)), ("x", None), ("saleprice", Some(7.0))]));
    train.push(record([("id", Some(101.0)), ("x", Some(5.0)), ("saleprice", None)]));

    InMemoryEngine::new()
        .with_table(&train_table(), train)
        .with_table(&test_table(), linear_rows(1000..1010))
}

#[tokio::test]
async fn linear_and_glm_recover_exact_relationship() {
    let mut engine = engine();
    let config = config(ModelConfig::defaults());

    let mut printed = Vec::new();
    let summary = ModelRunner::new(&mut engine, &config)
        .run(|report| {
            printed.push(report.model.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(printed, vec!["linear", "glm"]);
    assert!(summary.is_success());
    for report in &summary.reports {
        assert_abs_diff_eq!(report.r2, 1.0, epsilon = 1e-9);
        assert!(report.rmse < 1e-6, "{}: rmse {}", report.model, report.rmse);
        assert_eq!(report.predictions, 10);
    }
    assert_eq!(summary.reports[0].display_name, "LINEAR REGRESSION");
    assert_eq!(summary.reports[1].display_name, "GLM");
}

#[tokio::test]
async fn rerun_replaces_previous_predictions() {
    let mut engine = engine();
    let config = config(vec![ModelConfig::linear("linear")]);

    for _ in 0..2 {
        ModelRunner::new(&mut engine, &config)
            .run(|_| Ok(()))
            .await
            .unwrap();
    }

    let artifacts = ArtifactNames::for_model("public", "linear");
    let predictions = engine.table(&artifacts.predictions).unwrap();
    assert_eq!(predictions.len(), 10);

    let estimate = predictions
        .iter()
        .find(|row| row.get("id").copied().flatten() == Some(1003.0))
        .and_then(|row| row.get("estimate").copied().flatten())
        .unwrap();
    assert_abs_diff_eq!(estimate, 3.0 * 1003.0 + 7.0, epsilon = 1e-6);
}

fn broken_model() -> ModelConfig {
    // 존재하지 않는 컬럼은 모두 0 이 되어 X'X 가 특이 행렬
    let mut model = ModelConfig::linear("broken");
    model.features = Some(FeatureVector::new(vec![FeatureColumn::new("missing")], true));
    model
}

#[tokio::test]
async fn fail_fast_stops_at_first_failing_model() {
    let mut engine = engine();
    let config = config(vec![broken_model(), ModelConfig::linear("linear")]);

    let err = ModelRunner::new(&mut engine, &config)
        .run(|_| Ok(()))
        .await
        .unwrap_err();

    match err {
        EvalError::Stage { model, stage, .. } => {
            assert_eq!(model, "broken");
            assert_eq!(stage, Stage::Train);
        }
        other => panic!("unexpected error: {other}"),
    }
    let linear = ArtifactNames::for_model("public", "linear");
    assert!(!engine.has_table(&linear.model));
}

#[tokio::test]
async fn isolate_records_failure_and_continues() {
    let mut engine = engine();
    let mut config = config(vec![broken_model(), ModelConfig::linear("linear")]);
    config.failure_policy = FailurePolicy::Isolate;

    let summary = ModelRunner::new(&mut engine, &config)
        .run(|_| Ok(()))
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].model, "broken");
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].model, "linear");
}

#[tokio::test]
async fn empty_test_table_reports_unavailable_metric() {
    let mut engine = engine();
    engine.insert_table(&test_table(), Vec::new());
    let config = config(vec![ModelConfig::linear("linear")]);

    let err = ModelRunner::new(&mut engine, &config)
        .evaluate(&config.models[0])
        .await
        .unwrap_err();

    match err {
        EvalError::Stage { stage, source, .. } => {
            assert_eq!(stage, Stage::Evaluate);
            assert!(matches!(*source, EvalError::MetricUnavailable { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_training_table_fails_in_train_stage() {
    let mut engine = InMemoryEngine::new().with_table(&test_table(), linear_rows(0..5));
    let config = config(vec![ModelConfig::glm("poisson", Family::Poisson, Link::Log)]);

    let err = ModelRunner::new(&mut engine, &config)
        .evaluate(&config.models[0])
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::Stage { stage: Stage::Train, .. }));
    assert!(err.full_message().contains("training_silver_halfdata"));
}

#[tokio::test]
async fn training_recovers_slope_and_intercept() {
    use housing_eval::engine::{StatsEngine, TrainRequest};

    let mut engine = engine();
    let config = config(ModelConfig::defaults());

    for model in &config.models {
        let artifacts = ArtifactNames::for_model(&config.artifact_schema, &model.name);
        let handle = engine
            .train(&TrainRequest {
                model,
                source: &config.train_table,
                artifacts: &artifacts,
                target_column: &config.target_column,
                features: &config.features,
            })
            .await
            .unwrap();

        assert_eq!(handle.coefficients.len(), 2);
        assert_abs_diff_eq!(handle.coefficients[0], 7.0, epsilon = 1e-6);
        assert_abs_diff_eq!(handle.coefficients[1], 3.0, epsilon = 1e-6);
        assert_eq!(handle.features, config.features);
    }
}
