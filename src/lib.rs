// 하우징 데이터 동네별 파티션과 회귀 모델 평가
//
// - `db::partition`: 원본 테이블을 동네 값마다 별도 테이블로 분리
// - `pipeline`: 모델마다 정리 → 학습 → 예측 → 평가를 실행하고 R², RMSE 보고
// - `engine`: 웨어하우스 MADlib 엔진과 인메모리 엔진

pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;

pub use error::{EvalError, Result};
