// 데이터베이스 모듈
// 연결 설정, 단일 연결 관리, 쿼리 실행과 동네별 파티션 생성을 담당합니다.

pub mod config;
pub mod ident;
pub mod partition;
pub mod pool;
pub mod query;

pub use config::DbConfig;
pub use ident::TableName;
pub use partition::{Partitioner, PartitionSummary};
pub use pool::Database;
pub use query::{QueryExecutor, SqlExecutor};
