// 모델 학습/평가 파이프라인
//
// 모델 구성마다 정리 → 학습 → 예측 → 평가 → 보고를 순서대로 실행한다.
// 모델 간, 단계 간 동시 실행은 없다.

pub mod report;

use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde::Serialize;

use crate::config::{EvaluationConfig, FailurePolicy};
use crate::engine::{PredictRequest, StatsEngine, TrainRequest};
use crate::error::{EvalError, Result, Stage};
use crate::model::{ArtifactNames, ModelConfig};

/// 모델 하나의 평가 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub model: String,
    pub display_name: String,
    pub kind: String,
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub predictions: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// 실패한 모델
#[derive(Debug)]
pub struct ModelFailure {
    pub model: String,
    pub error: EvalError,
}

/// 전체 실행 결과
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<EvaluationReport>,
    pub failures: Vec<ModelFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 모델 평가 실행기
pub struct ModelRunner<'a, E: StatsEngine> {
    engine: &'a mut E,
    config: &'a EvaluationConfig,
}

impl<'a, E: StatsEngine> ModelRunner<'a, E> {
    pub fn new(engine: &'a mut E, config: &'a EvaluationConfig) -> Self {
        Self { engine, config }
    }

    /// 선언 순서대로 모든 모델 평가
    ///
    /// 결과는 모델이 끝날 때마다 `on_report` 로 전달된다.
    /// `FailFast` 는 첫 실패를 반환하고, `Isolate` 는 실패를 기록한 뒤 다음 모델을 계속한다.
    pub async fn run<F>(&mut self, mut on_report: F) -> Result<RunSummary>
    where
        F: FnMut(&EvaluationReport) -> Result<()>,
    {
        let config = self.config;
        let mut summary = RunSummary::default();

        for model in &config.models {
            match self.evaluate(model).await {
                Ok(report) => {
                    on_report(&report)?;
                    summary.reports.push(report);
                }
                Err(e) => {
                    error!("{} 평가 실패: {}", model.display_name(), e.full_message());
                    match config.failure_policy {
                        FailurePolicy::FailFast => return Err(e),
                        FailurePolicy::Isolate => summary.failures.push(ModelFailure {
                            model: model.name.clone(),
                            error: e,
                        }),
                    }
                }
            }
        }

        info!(
            "모델 평가 완료: 성공 {} 개, 실패 {} 개",
            summary.reports.len(),
            summary.failures.len()
        );
        Ok(summary)
    }

    /// 모델 하나 평가
    pub async fn evaluate(&mut self, model: &ModelConfig) -> Result<EvaluationReport> {
        let config = self.config;
        let name = model.name.as_str();
        let display_name = model.display_name();
        let artifacts = ArtifactNames::for_model(&config.artifact_schema, name);
        let features = config.features_for(model);
        let started = Instant::now();

        // 1. 이전 산출물 정리
        debug!("{} 이전 산출물 삭제", display_name);
        self.engine
            .drop_artifacts(&artifacts)
            .await
            .map_err(|e| e.at_stage(name, Stage::Cleanup))?;

        // 2. 학습
        info!("{} 모델 학습 중... ({})", display_name, model.kind);
        let stage_started = Instant::now();
        let handle = self
            .engine
            .train(&TrainRequest {
                model,
                source: &config.train_table,
                artifacts: &artifacts,
                target_column: &config.target_column,
                features,
            })
            .await
            .map_err(|e| e.at_stage(name, Stage::Train))?;
        info!(
            "{} 학습 완료 ({}, 계수 {} 개)",
            display_name,
            humantime::format_duration(round_millis(stage_started.elapsed())),
            handle.coefficients.len()
        );

        // 3. 테스트 테이블 예측
        let stage_started = Instant::now();
        let predictions = self
            .engine
            .predict(
                &handle,
                &PredictRequest {
                    test_table: &config.test_table,
                    id_column: &config.id_column,
                    target_column: &config.target_column,
                    artifacts: &artifacts,
                },
            )
            .await
            .map_err(|e| e.at_stage(name, Stage::Predict))?;
        info!(
            "{} 예측 완료 ({}, {} 건)",
            display_name,
            humantime::format_duration(round_millis(stage_started.elapsed())),
            predictions.rows
        );

        // 4. 평가
        let stage_started = Instant::now();
        let metrics = self
            .engine
            .score(&predictions, &artifacts)
            .await
            .map_err(|e| e.at_stage(name, Stage::Evaluate))?;
        let rmse = metrics
            .rmse()
            .map_err(|e| e.at_stage(name, Stage::Evaluate))?;
        debug!(
            "{} 지표 계산 ({})",
            display_name,
            humantime::format_duration(round_millis(stage_started.elapsed()))
        );

        let elapsed = started.elapsed();
        info!(
            "{} 평가 완료 ({})",
            display_name,
            humantime::format_duration(round_millis(elapsed))
        );

        Ok(EvaluationReport {
            model: model.name.clone(),
            display_name,
            kind: model.kind.to_string(),
            r2: metrics.r2,
            mse: metrics.mse,
            rmse,
            predictions: predictions.rows,
            elapsed,
        })
    }
}

fn round_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
