// 프로세스 내 회귀 엔진
//
// 테이블을 행 목록으로 보관하고 최소제곱과 IRLS 로 계수를 구한다.
// 웨어하우스 없이 파이프라인 전체를 실행할 때 사용한다.

use std::collections::HashMap;

use log::{debug, trace};
use ndarray::{Array1, Array2, Axis};

use super::{
    first_metric, MetricRecord, ModelHandle, PredictRequest, PredictionSet, StatsEngine,
    TrainRequest,
};
use crate::constants::madlib::{ESTIMATE_COLUMN, MSE_COLUMN, R2_COLUMN};
use crate::db::ident::TableName;
use crate::error::{EvalError, Result};
use crate::model::{ArtifactNames, Family, Link, ModelKind};

/// 컬럼 이름 → 값 (NULL 은 None)
pub type Record = HashMap<String, Option<f64>>;

/// `(컬럼, 값)` 목록으로 행 생성
pub fn record<'a, I>(values: I) -> Record
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    values
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

const DEFAULT_MAX_ITER: u32 = 100;
const DEFAULT_TOLERANCE: f64 = 1e-8;

/// 인메모리 통계 엔진
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    tables: HashMap<String, Vec<Record>>,
    models: HashMap<String, Vec<f64>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테이블 등록 (같은 이름은 교체)
    pub fn insert_table(&mut self, table: &TableName, rows: Vec<Record>) {
        self.tables.insert(table.plain(), rows);
    }

    pub fn with_table(mut self, table: &TableName, rows: Vec<Record>) -> Self {
        self.insert_table(table, rows);
        self
    }

    pub fn table(&self, table: &TableName) -> Option<&[Record]> {
        self.tables.get(&table.plain()).map(Vec::as_slice)
    }

    pub fn has_table(&self, table: &TableName) -> bool {
        self.tables.contains_key(&table.plain()) || self.models.contains_key(&table.plain())
    }

    fn rows(&self, table: &TableName) -> Result<&[Record]> {
        self.table(table).ok_or_else(|| missing_relation(&table.plain()))
    }

    /// CREATE TABLE 과 같이 이미 있으면 실패
    fn create_table(&mut self, table: &TableName, rows: Vec<Record>) -> Result<()> {
        if self.has_table(table) {
            return Err(EvalError::Engine(format!(
                "relation \"{}\" already exists",
                table.plain()
            )));
        }
        self.insert_table(table, rows);
        Ok(())
    }
}

impl StatsEngine for InMemoryEngine {
    async fn drop_artifacts(&mut self, artifacts: &ArtifactNames) -> Result<()> {
        for table in artifacts.all() {
            self.tables.remove(&table.plain());
            self.models.remove(&table.plain());
        }
        Ok(())
    }

    async fn train(&mut self, request: &TrainRequest<'_>) -> Result<ModelHandle> {
        if self.has_table(&request.artifacts.model) {
            return Err(EvalError::Engine(format!(
                "output table \"{}\" already exists",
                request.artifacts.model.plain()
            )));
        }

        let rows = self.rows(request.source)?;
        let (x, y) = design_matrix(rows, request)?;
        debug!(
            "학습 데이터: {} 행 x {} 특성 ({})",
            x.nrows(),
            x.ncols(),
            request.source.plain()
        );

        let coefficients = match request.model.kind {
            ModelKind::Linear => solve_least_squares(&x, &y).ok_or_else(|| {
                EvalError::Engine("linear regression: X'X is singular".into())
            })?,
            ModelKind::Glm { family, link } => fit_glm(
                &x,
                &y,
                family,
                link,
                request.model.max_iter.unwrap_or(DEFAULT_MAX_ITER),
                request.model.tolerance.unwrap_or(DEFAULT_TOLERANCE),
            )?,
        };
        let coefficients = coefficients.to_vec();
        if coefficients.is_empty() {
            return Err(EvalError::EmptyModel {
                table: request.artifacts.model.plain(),
            });
        }
        trace!("계수: {:?}", coefficients);

        let num_rows = x.nrows() as f64;
        self.models
            .insert(request.artifacts.model.plain(), coefficients.clone());
        self.insert_table(
            &request.artifacts.model_summary,
            vec![record([("num_rows_processed", Some(num_rows))])],
        );

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
        let coefficients = self
            .models
            .get(&model.table.plain())
            .ok_or_else(|| missing_relation(&model.table.plain()))?;
        let coefficients = Array1::from(coefficients.clone());

        let mut predictions = Vec::new();
        for row in self.rows(request.test_table)? {
            let values = model
                .features
                .extract(|name| row.get(name).copied().flatten());
            if values.len() != coefficients.len() {
                return Err(EvalError::Engine(format!(
                    "feature vector length {} does not match {} coefficients",
                    values.len(),
                    coefficients.len()
                )));
            }
            let eta = Array1::from(values).dot(&coefficients);
            let estimate = match model.kind {
                ModelKind::Linear => eta,
                ModelKind::Glm { link, .. } => inverse_link(link, eta),
            };
            predictions.push(record([
                (request.id_column, row.get(request.id_column).copied().flatten()),
                (request.target_column, row.get(request.target_column).copied().flatten()),
                (ESTIMATE_COLUMN, Some(estimate)),
            ]));
        }

        let rows = predictions.len() as u64;
        self.create_table(&request.artifacts.predictions, predictions)?;

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
        self.tables.remove(&artifacts.metrics.plain());
        self.tables.remove(&artifacts.metrics_mse.plain());

        let pairs: Vec<(f64, f64)> = self
            .rows(&predictions.table)?
            .iter()
            .filter_map(|row| {
                let estimate = row.get(ESTIMATE_COLUMN).copied().flatten()?;
                let actual = row.get(&predictions.target_column).copied().flatten()?;
                Some((estimate, actual))
            })
            .collect();

        let (r2, mse) = regression_metrics(&pairs);
        self.create_table(&artifacts.metrics, vec![record([(R2_COLUMN, r2)])])?;
        self.create_table(&artifacts.metrics_mse, vec![record([(MSE_COLUMN, mse)])])?;

        let r2 = first_metric(
            read_column(self.rows(&artifacts.metrics)?, R2_COLUMN),
            R2_COLUMN,
            &artifacts.metrics,
        )?;
        let mse = first_metric(
            read_column(self.rows(&artifacts.metrics_mse)?, MSE_COLUMN),
            MSE_COLUMN,
            &artifacts.metrics_mse,
        )?;

        Ok(MetricRecord { r2, mse })
    }
}

fn read_column(rows: &[Record], column: &str) -> Vec<Option<f64>> {
    rows.iter().map(|row| row.get(column).copied().flatten()).collect()
}

fn missing_relation(table: &str) -> EvalError {
    EvalError::Engine(format!("relation \"{}\" does not exist", table))
}

/// 특성 행렬과 목표 벡터. 목표가 NULL 인 행은 제외
fn design_matrix(
    rows: &[Record],
    request: &TrainRequest<'_>,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let width = request.features.len();
    let mut flat = Vec::with_capacity(rows.len() * width);
    let mut targets = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(target) = row.get(request.target_column).copied().flatten() else {
            continue;
        };
        flat.extend(request.features.extract(|name| row.get(name).copied().flatten()));
        targets.push(target);
    }

    if targets.is_empty() {
        return Err(EvalError::Engine(format!(
            "no rows with non-null \"{}\" in {}",
            request.target_column,
            request.source.plain()
        )));
    }

    let x = Array2::from_shape_vec((targets.len(), width), flat)
        .map_err(|e| EvalError::Engine(format!("design matrix: {}", e)))?;
    Ok((x, Array1::from(targets)))
}

/// R², MSE 계산. 계산할 수 없으면 None (SQL NULL 과 같은 의미)
fn regression_metrics(pairs: &[(f64, f64)]) -> (Option<f64>, Option<f64>) {
    if pairs.is_empty() {
        return (None, None);
    }
    let n = pairs.len() as f64;
    let mean = pairs.iter().map(|(_, actual)| actual).sum::<f64>() / n;
    let ss_res: f64 = pairs.iter().map(|(est, actual)| (actual - est).powi(2)).sum();
    let ss_tot: f64 = pairs.iter().map(|(_, actual)| (actual - mean).powi(2)).sum();

    let r2 = if ss_tot > 0.0 { Some(1.0 - ss_res / ss_tot) } else { None };
    (r2, Some(ss_res / n))
}

fn inverse_link(link: Link, eta: f64) -> f64 {
    match link {
        Link::Identity => eta,
        Link::Log => eta.exp(),
    }
}

/// IRLS 로 GLM 적합
fn fit_glm(
    x: &Array2<f64>,
    y: &Array1<f64>,
    family: Family,
    link: Link,
    max_iter: u32,
    tolerance: f64,
) -> Result<Array1<f64>> {
    let mut mu = match family {
        Family::Gaussian => match link {
            Link::Identity => y.clone(),
            Link::Log => {
                if y.iter().any(|v| *v <= 0.0) {
                    return Err(EvalError::Engine(
                        "gaussian family with log link requires positive response".into(),
                    ));
                }
                y.clone()
            }
        },
        Family::Poisson => {
            if y.iter().any(|v| *v < 0.0) {
                return Err(EvalError::Engine(
                    "poisson family requires non-negative response".into(),
                ));
            }
            y.mapv(|v| v + 0.1)
        }
    };
    let mut eta = match link {
        Link::Identity => mu.clone(),
        Link::Log => mu.mapv(f64::ln),
    };
    let mut beta = Array1::<f64>::zeros(x.ncols());

    for iteration in 1..=max_iter {
        // dmu/deta 와 분산 함수
        let derivative = match link {
            Link::Identity => Array1::ones(mu.len()),
            Link::Log => mu.clone(),
        };
        let variance = match family {
            Family::Gaussian => Array1::ones(mu.len()),
            Family::Poisson => mu.clone(),
        };

        let z = &eta + &((y - &mu) / &derivative);
        let w = derivative.mapv(|d| d * d) / &variance;
        if w.iter().any(|v| !v.is_finite()) {
            return Err(EvalError::Engine("glm: non-finite IRLS weights".into()));
        }

        let xw = x * &w.view().insert_axis(Axis(1));
        let xtwx = xw.t().dot(x);
        let xtwz = xw.t().dot(&z);
        let next = solve_normal(&xtwx, &xtwz)
            .ok_or_else(|| EvalError::Engine("glm: weighted X'X is singular".into()))?;

        let change = (&next - &beta).iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let scale = 1.0 + beta.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        beta = next;
        eta = x.dot(&beta);
        mu = eta.mapv(|e| inverse_link(link, e));

        if change <= tolerance * scale {
            debug!("GLM 수렴: {} 회 반복", iteration);
            return Ok(beta);
        }
    }

    Err(EvalError::Engine(format!(
        "glm: did not converge in {} iterations",
        max_iter
    )))
}

/// 정규방정식 (X^T X) w = X^T y
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    solve_normal(&xtx, &xty)
}

/// 대칭 양정치 시스템: Cholesky 우선, 실패 시 부분 피벗 가우스 소거
fn solve_normal(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    cholesky_solve(a, b).or_else(|| gaussian_solve(a, b))
}

fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn gaussian_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if aug[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot, j]);
            }
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]] / aug[[col, col]];
                for j in col..=n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(Array1::from_iter((0..n).map(|i| aug[[i, n]] / aug[[i, i]])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use crate::features::{FeatureColumn, FeatureVector};
    use crate::model::ModelConfig;

    #[test]
    fn cholesky_and_gaussian_agree() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let c = cholesky_solve(&a, &b).unwrap();
        let g = gaussian_solve(&a, &b).unwrap();
        assert_abs_diff_eq!(c[0], g[0], epsilon = 1e-12);
        assert_abs_diff_eq!(c[1], g[1], epsilon = 1e-12);
        assert_abs_diff_eq!(c[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_system_has_no_solution() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(solve_normal(&a, &b).is_none());
    }

    #[test]
    fn metrics_for_known_predictions() {
        let (r2, mse) = regression_metrics(&[(1.0, 1.0), (2.0, 3.0), (3.0, 5.0)]);
        // ss_res = 0 + 1 + 4, ss_tot = 4 + 0 + 4
        assert_abs_diff_eq!(mse.unwrap(), 5.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r2.unwrap(), 1.0 - 5.0 / 8.0, epsilon = 1e-12);
        assert_eq!(regression_metrics(&[]), (None, None));
    }

    #[test]
    fn poisson_log_recovers_exponential_trend() {
        // y = exp(0.5 + 0.3 x)
        let xs: Vec<f64> = (0..20).map(|i| i as f64 / 2.0).collect();
        let mut flat = Vec::new();
        for x in &xs {
            flat.push(1.0);
            flat.push(*x);
        }
        let x = Array2::from_shape_vec((xs.len(), 2), flat).unwrap();
        let y = Array1::from_iter(xs.iter().map(|x| (0.5 + 0.3 * x).exp()));

        let beta = fit_glm(&x, &y, Family::Poisson, Link::Log, 100, 1e-10).unwrap();
        assert_abs_diff_eq!(beta[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(beta[1], 0.3, epsilon = 1e-6);
    }

    #[tokio::test]
    async fn training_into_existing_model_table_fails() {
        let train: TableName = "public.train".parse().unwrap();
        let rows = (1..=5)
            .map(|i| record([("x", Some(i as f64)), ("y", Some(2.0 * i as f64))]))
            .collect();
        let mut engine = InMemoryEngine::new().with_table(&train, rows);
        let model = ModelConfig::linear("linear");
        let artifacts = ArtifactNames::for_model("public", "linear");
        let features = FeatureVector::new(vec![FeatureColumn::new("x")], true);
        let request = TrainRequest {
            model: &model,
            source: &train,
            artifacts: &artifacts,
            target_column: "y",
            features: &features,
        };

        engine.train(&request).await.unwrap();
        assert!(engine.train(&request).await.is_err());

        engine.drop_artifacts(&artifacts).await.unwrap();
        assert!(engine.train(&request).await.is_ok());
    }
}
