// MADlib 학습/예측/평가 SQL 쿼리

use crate::db::ident::{quote_ident, TableName};

/// 예측값 컬럼 이름
pub const ESTIMATE_COLUMN: &str = "estimate";

/// 선형 회귀 학습 쿼리
///
/// $1 학습 테이블, $2 모델 테이블, $3 종속 변수, $4 독립 변수 식
pub const LINREGR_TRAIN: &str = "
    SELECT madlib.linregr_train(
        $1::varchar,
        $2::varchar,
        $3::varchar,
        $4::varchar,
        NULL,
        FALSE
    )";

/// GLM 학습 쿼리
///
/// $5 family 파라미터, $6 최적화 파라미터 (NULL 허용)
pub const GLM_TRAIN: &str = "
    SELECT madlib.glm(
        $1::varchar,
        $2::varchar,
        $3::varchar,
        $4::varchar,
        $5::varchar,
        NULL,
        $6::varchar,
        TRUE
    )";

/// R² 계산 쿼리
///
/// $1 예측 테이블, $2 결과 테이블, $3 예측 컬럼, $4 관측 컬럼
pub const R2_SCORE: &str = "
    SELECT madlib.r2_score(
        $1::varchar,
        $2::varchar,
        $3::varchar,
        $4::varchar,
        NULL
    )";

/// MSE 계산 쿼리
pub const MEAN_SQUARED_ERROR: &str = "
    SELECT madlib.mean_squared_error(
        $1::varchar,
        $2::varchar,
        $3::varchar,
        $4::varchar,
        NULL
    )";

/// R² 결과 컬럼
pub const R2_COLUMN: &str = "r2_score";
/// MSE 결과 컬럼
pub const MSE_COLUMN: &str = "mean_squared_error";

/// 산출물 테이블 삭제 쿼리
pub fn drop_table(table: &TableName) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", table)
}

/// 모델 계수 조회 쿼리 (계수 하나당 한 행)
pub fn select_coefficients(model: &TableName) -> String {
    format!("SELECT unnest(coef) FROM {}", model)
}

/// 단일 지표 조회 쿼리
pub fn select_metric(table: &TableName, column: &str) -> String {
    format!("SELECT {} FROM {}", quote_ident(column), table)
}

/// 예측 테이블 생성 쿼리
///
/// `predict_call` 은 `m.coef` 와 특성 벡터를 인자로 받는 MADlib 예측 함수 호출이다.
pub fn create_predictions(
    predictions: &TableName,
    test_table: &TableName,
    model_table: &TableName,
    id_column: &str,
    target_column: &str,
    predict_call: &str,
) -> String {
    format!(
        "CREATE TABLE {pred} AS
         SELECT t.{id}, t.{target}, {call} AS {est}
         FROM {test} t, {model} m",
        pred = predictions,
        id = quote_ident(id_column),
        target = quote_ident(target_column),
        call = predict_call,
        est = quote_ident(ESTIMATE_COLUMN),
        test = test_table,
        model = model_table,
    )
}

/// 선형 회귀 예측 함수 호출
pub fn linregr_predict(features: &str) -> String {
    format!("madlib.linregr_predict(m.coef, {})", features)
}

/// GLM 예측 함수 호출
pub fn glm_predict(features: &str, link: &str) -> String {
    format!("madlib.glm_predict(m.coef, {}, '{}')", features, link)
}
