use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime};
use log::{debug, info};
use tokio_postgres::NoTls;

use super::config::DbConfig;
use super::query::QueryExecutor;
use crate::error::{EvalError, Result};

/// 단일 연결 데이터베이스 핸들
///
/// 풀 크기는 1로 고정된다. 프로세스 시작 시 한 번 연결을 확보하고
/// 종료 시 `close` 로 해제한다. 에러 경로에서는 drop 으로 해제된다.
pub struct Database {
    pool: Pool,
    config: DbConfig,
}

impl Database {
    /// 연결 풀 생성 및 연결 테스트
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let conn_config = &config.connection;

        let mut cfg = Config::new();
        cfg.host = Some(conn_config.host.clone());
        cfg.port = Some(conn_config.port);
        cfg.user = Some(conn_config.user.clone());
        cfg.password = conn_config.password.clone();
        cfg.dbname = Some(conn_config.database.clone());
        cfg.pool = Some(PoolConfig::new(1));
        cfg.connect_timeout = Some(config.get_connection_timeout());

        debug!("DB 연결 풀 생성 중... ({})", config.describe());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| EvalError::Connection(format!("{}: {}", config.describe(), e)))?;

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// 연결 확보 후 쿼리 실행기 반환
    ///
    /// 반환된 실행기가 살아 있는 동안 연결을 점유한다.
    pub async fn acquire(&self) -> Result<QueryExecutor> {
        let client: Object = self
            .pool
            .get()
            .await
            .map_err(|e| EvalError::Connection(format!("{}: {}", self.config.describe(), e)))?;

        let row = client
            .query_one("SELECT version()", &[])
            .await
            .map_err(|e| EvalError::Connection(format!("{}: {}", self.config.describe(), e)))?;
        let version: String = row.get(0);
        info!("DB 연결 성공: {}", version);

        Ok(QueryExecutor::new(client))
    }

    /// 연결 풀 종료
    pub fn close(self) {
        self.pool.close();
        info!("DB 연결 종료: {}", self.config.describe());
    }
}
