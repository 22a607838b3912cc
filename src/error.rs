use std::fmt;

use thiserror::Error;

/// 공통 Result 타입
pub type Result<T> = std::result::Result<T, EvalError>;

/// 연결 실패 시 종료 코드
pub const EXIT_CONNECTION_FAILURE: i32 = 2;
/// 그 외 실패 시 종료 코드
pub const EXIT_FAILURE: i32 = 1;

/// 모델 평가 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cleanup,
    Train,
    Predict,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Cleanup => "cleanup",
            Stage::Train => "train",
            Stage::Predict => "predict",
            Stage::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// housing-eval 에러
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("데이터베이스 연결 실패: {0}")]
    Connection(String),

    #[error("설정 오류: {0}")]
    Config(String),

    #[error("데이터베이스 오류")]
    Database(#[from] tokio_postgres::Error),

    #[error("연결 풀 오류")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("통계 엔진 오류: {0}")]
    Engine(String),

    #[error("테이블 이름 충돌: '{first}' 와 '{second}' 가 모두 {table} 로 변환됨")]
    NameCollision {
        first: String,
        second: String,
        table: String,
    },

    #[error("테이블 이름으로 사용할 수 없는 동네 값: {0:?}")]
    InvalidLabel(String),

    #[error("동네 '{neighborhood}' 파티션 생성 실패")]
    Partition {
        neighborhood: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("학습 결과 계수 테이블이 비어 있음: {table}")]
    EmptyModel { table: String },

    #[error("{metric} 값을 {table} 에서 읽을 수 없음 (결과 없음)")]
    MetricUnavailable { metric: &'static str, table: String },

    #[error("{metric} 값이 유효하지 않음: {value}")]
    InvalidMetric { metric: &'static str, value: f64 },

    #[error("모델 '{model}' {stage} 단계 실패")]
    Stage {
        model: String,
        stage: Stage,
        #[source]
        source: Box<EvalError>,
    },

    #[error("입출력 오류")]
    Io(#[from] std::io::Error),

    #[error("YAML 파싱 오류")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON 직렬화 오류")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// 단계 정보로 감싸기
    pub fn at_stage(self, model: &str, stage: Stage) -> Self {
        EvalError::Stage {
            model: model.to_string(),
            stage,
            source: Box::new(self),
        }
    }

    /// 원인 체인을 포함한 전체 메시지 (`단계: 원인: 원인`)
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// 프로세스 종료 코드
    pub fn exit_code(&self) -> i32 {
        match self {
            EvalError::Connection(_) => EXIT_CONNECTION_FAILURE,
            _ => EXIT_FAILURE,
        }
    }
}
