// 통계 엔진 인터페이스
//
// 파이프라인은 학습/예측/평가를 이 트레이트로만 요청한다.
// `MadlibEngine` 은 웨어하우스의 MADlib 함수를, `InMemoryEngine` 은 프로세스 내 계산을 사용한다.

pub mod madlib;
pub mod memory;

use crate::db::ident::TableName;
use crate::error::{EvalError, Result};
use crate::features::FeatureVector;
use crate::model::{ArtifactNames, ModelConfig, ModelKind};

pub use madlib::MadlibEngine;
pub use memory::InMemoryEngine;

/// 학습 요청
#[derive(Debug, Clone, Copy)]
pub struct TrainRequest<'a> {
    pub model: &'a ModelConfig,
    pub source: &'a TableName,
    pub artifacts: &'a ArtifactNames,
    pub target_column: &'a str,
    pub features: &'a FeatureVector,
}

/// 예측 요청
#[derive(Debug, Clone, Copy)]
pub struct PredictRequest<'a> {
    pub test_table: &'a TableName,
    pub id_column: &'a str,
    pub target_column: &'a str,
    pub artifacts: &'a ArtifactNames,
}

/// 학습된 모델 핸들
///
/// 학습에 사용한 특성 벡터를 보관하며 예측은 반드시 이 벡터를 사용한다.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHandle {
    pub model_name: String,
    pub kind: ModelKind,
    pub table: TableName,
    pub features: FeatureVector,
    pub coefficients: Vec<f64>,
}

/// 예측 결과 테이블
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    pub table: TableName,
    pub target_column: String,
    pub rows: u64,
}

/// 평가 지표
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRecord {
    pub r2: f64,
    pub mse: f64,
}

impl MetricRecord {
    /// RMSE = sqrt(MSE). 음수나 유한하지 않은 MSE 는 에러
    pub fn rmse(&self) -> Result<f64> {
        if !self.mse.is_finite() || self.mse < 0.0 {
            return Err(EvalError::InvalidMetric {
                metric: "mean_squared_error",
                value: self.mse,
            });
        }
        Ok(self.mse.sqrt())
    }
}

/// 통계 엔진
#[allow(async_fn_in_trait)]
pub trait StatsEngine {
    /// 이전 실행의 산출물 삭제. 존재하지 않아도 에러 아님
    async fn drop_artifacts(&mut self, artifacts: &ArtifactNames) -> Result<()>;

    /// 학습 후 모델 핸들 반환. 계수가 없으면 `EmptyModel`
    async fn train(&mut self, request: &TrainRequest<'_>) -> Result<ModelHandle>;

    /// 테스트 테이블에 계수를 적용해 예측 테이블 생성
    async fn predict(
        &mut self,
        model: &ModelHandle,
        request: &PredictRequest<'_>,
    ) -> Result<PredictionSet>;

    /// R² 와 MSE 계산 후 읽기
    async fn score(
        &mut self,
        predictions: &PredictionSet,
        artifacts: &ArtifactNames,
    ) -> Result<MetricRecord>;
}

/// 지표 테이블에서 읽은 첫 값 확인
pub(crate) fn first_metric(
    values: Vec<Option<f64>>,
    metric: &'static str,
    table: &TableName,
) -> Result<f64> {
    match values.into_iter().next() {
        Some(Some(value)) if value.is_finite() => Ok(value),
        Some(Some(value)) => Err(EvalError::InvalidMetric { metric, value }),
        _ => Err(EvalError::MetricUnavailable {
            metric,
            table: table.plain(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmse_rejects_negative_and_nan_mse() {
        let ok = MetricRecord { r2: 0.9, mse: 16.0 };
        assert_eq!(ok.rmse().unwrap(), 4.0);

        let negative = MetricRecord { r2: 0.9, mse: -1.0 };
        assert!(matches!(negative.rmse(), Err(EvalError::InvalidMetric { .. })));

        let nan = MetricRecord { r2: 0.9, mse: f64::NAN };
        assert!(matches!(nan.rmse(), Err(EvalError::InvalidMetric { .. })));
    }

    #[test]
    fn empty_or_null_metric_is_explicit_error() {
        let table: TableName = "public.linear_evaltest_metrics".parse().unwrap();
        assert!(matches!(
            first_metric(vec![], "r2_score", &table),
            Err(EvalError::MetricUnavailable { .. })
        ));
        assert!(matches!(
            first_metric(vec![None], "r2_score", &table),
            Err(EvalError::MetricUnavailable { .. })
        ));
        assert_eq!(first_metric(vec![Some(0.5)], "r2_score", &table).unwrap(), 0.5);
    }
}
