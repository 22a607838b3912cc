use log::{debug, info};

use super::{
    first_metric, MetricRecord, ModelHandle, PredictRequest, PredictionSet, StatsEngine,
    TrainRequest,
};
use crate::constants::madlib;
use crate::db::query::SqlExecutor;
use crate::error::{EvalError, Result};
use crate::model::{ArtifactNames, ModelKind};

/// MADlib 기반 통계 엔진
pub struct MadlibEngine<'a, X: SqlExecutor> {
    executor: &'a X,
}

impl<'a, X: SqlExecutor> MadlibEngine<'a, X> {
    pub fn new(executor: &'a X) -> Self {
        Self { executor }
    }
}

impl<X: SqlExecutor> StatsEngine for MadlibEngine<'_, X> {
    async fn drop_artifacts(&mut self, artifacts: &ArtifactNames) -> Result<()> {
        for table in artifacts.all() {
            self.executor.execute(&madlib::drop_table(table), &[]).await?;
        }
        Ok(())
    }

    async fn train(&mut self, request: &TrainRequest<'_>) -> Result<ModelHandle> {
        let source = request.source.plain();
        let model_table = request.artifacts.model.plain();
        let features = request.features.to_sql();

        match request.model.kind {
            ModelKind::Linear => {
                self.executor
                    .execute(
                        madlib::LINREGR_TRAIN,
                        &[&source, &model_table, &request.target_column, &features],
                    )
                    .await?;
            }
            ModelKind::Glm { .. } => {
                let family_params = request.model.family_params();
                let optim_params = request.model.optim_params();
                self.executor
                    .execute(
                        madlib::GLM_TRAIN,
                        &[
                            &source,
                            &model_table,
                            &request.target_column,
                            &features,
                            &family_params,
                            &optim_params,
                        ],
                    )
                    .await?;
            }
        }

        let coefficients = self
            .executor
            .query_f64(&madlib::select_coefficients(&request.artifacts.model), &[])
            .await?;
        if coefficients.is_empty() {
            return Err(EvalError::EmptyModel {
                table: model_table,
            });
        }
        let Some(coefficients) = coefficients.into_iter().collect::<Option<Vec<f64>>>() else {
            return Err(EvalError::Engine(format!(
                "{} 에 NULL 계수가 있음 (특성 컬럼이 모두 NULL 이거나 공선성)",
                model_table
            )));
        };
        debug!("계수 {} 개 로드: {}", coefficients.len(), model_table);

        Ok(ModelHandle {
            model_name: request.model.name.clone(),
            kind: request.model.kind,
            table: request.artifacts.model.clone(),
            features: request.features.clone(),
            coefficients,
        })
    }

    async fn predict(
        &mut self,
        model: &ModelHandle,
        request: &PredictRequest<'_>,
    ) -> Result<PredictionSet> {
        let features = model.features.to_sql();
        let call = match model.kind {
            ModelKind::Linear => madlib::linregr_predict(&features),
            ModelKind::Glm { link, .. } => madlib::glm_predict(&features, link.as_str()),
        };
        let sql = madlib::create_predictions(
            &request.artifacts.predictions,
            request.test_table,
            &model.table,
            request.id_column,
            request.target_column,
            &call,
        );

        let rows = self.executor.execute(&sql, &[]).await?;
        info!("예측 {} 건 생성: {}", rows, request.artifacts.predictions.plain());

        Ok(PredictionSet {
            table: request.artifacts.predictions.clone(),
            target_column: request.target_column.to_string(),
            rows,
        })
    }

    async fn score(
        &mut self,
        predictions: &PredictionSet,
        artifacts: &ArtifactNames,
    ) -> Result<MetricRecord> {
        self.executor
            .execute(&madlib::drop_table(&artifacts.metrics), &[])
            .await?;
        self.executor
            .execute(&madlib::drop_table(&artifacts.metrics_mse), &[])
            .await?;

        let prediction_table = predictions.table.plain();
        let estimate = madlib::ESTIMATE_COLUMN;

        // R²
        let metrics_table = artifacts.metrics.plain();
        self.executor
            .execute(
                madlib::R2_SCORE,
                &[&prediction_table, &metrics_table, &estimate, &predictions.target_column],
            )
            .await?;
        let values = self
            .executor
            .query_f64(&madlib::select_metric(&artifacts.metrics, madlib::R2_COLUMN), &[])
            .await?;
        let r2 = first_metric(values, madlib::R2_COLUMN, &artifacts.metrics)?;

        // MSE
        let mse_table = artifacts.metrics_mse.plain();
        self.executor
            .execute(
                madlib::MEAN_SQUARED_ERROR,
                &[&prediction_table, &mse_table, &estimate, &predictions.target_column],
            )
            .await?;
        let values = self
            .executor
            .query_f64(&madlib::select_metric(&artifacts.metrics_mse, madlib::MSE_COLUMN), &[])
            .await?;
        let mse = first_metric(values, madlib::MSE_COLUMN, &artifacts.metrics_mse)?;

        debug!("지표 읽기 완료 ({}): r2={}, mse={}", prediction_table, r2, mse);

        Ok(MetricRecord { r2, mse })
    }
}
