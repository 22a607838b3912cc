// SQL 쿼리 모듈 (용도별 SQL 쿼리 관리)
pub mod partition;
pub mod madlib;

// 기본 설정 파일 경로
pub const DB_CONFIG_FILE: &str = "db.yml";
pub const PIPELINE_CONFIG_FILE: &str = "pipeline.yml";

// 산출물 테이블 접미사
pub const ARTIFACT_PREFIX_SUFFIX: &str = "_evaltest";
pub const MODEL_SUFFIX: &str = "_model";
pub const MODEL_SUMMARY_SUFFIX: &str = "_model_summary";
pub const PREDICTIONS_SUFFIX: &str = "_predictions";
pub const METRICS_SUFFIX: &str = "_metrics";
pub const METRICS_MSE_SUFFIX: &str = "_metrics_mse";

// 리포트 소수점 자리수
pub const R2_PRECISION: usize = 4;
pub const RMSE_PRECISION: usize = 2;

// PostgreSQL 식별자 최대 길이 (NAMEDATALEN - 1)
pub const MAX_IDENT_LEN: usize = 63;
