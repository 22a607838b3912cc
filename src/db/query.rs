use deadpool_postgres::Object;
use log::{debug, trace};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::error::Result;

/// SQL 실행 인터페이스
///
/// 파티셔너와 MADlib 엔진은 이 트레이트만 사용한다. 모든 구문은
/// 결과를 끝까지 소비한 뒤 다음 구문을 실행한다.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// 단일 구문 실행 후 영향받은 행 수 반환
    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64>;

    /// 첫 번째 컬럼을 텍스트로 조회
    async fn query_strings(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Option<String>>>;

    /// 첫 번째 컬럼을 실수로 조회
    async fn query_f64(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Option<f64>>>;

    /// 첫 번째 컬럼을 정수로 조회 (`count(*)` 등)
    async fn query_i64(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<i64>>;
}

/// 쿼리 실행기 구조체
///
/// 프로세스 수명 동안 하나의 연결을 점유한다.
pub struct QueryExecutor {
    client: Object,
}

impl QueryExecutor {
    /// 새 QueryExecutor 인스턴스 생성
    pub fn new(client: Object) -> Self {
        Self { client }
    }

    /// 쿼리 실행 후 결과 매핑
    async fn query_mapped<T, F>(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        row_mapper: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&Row) -> std::result::Result<T, tokio_postgres::Error>,
    {
        debug!("쿼리 실행 및 결과 매핑: {}", sql.trim());
        trace!("파라미터: {:?}", params);
        let rows = self.client.query(sql, params).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push(row_mapper(row)?);
        }

        Ok(results)
    }

    /// 연결 반환
    pub fn release(self) {
        drop(self.client);
        debug!("DB 연결 반환");
    }
}

impl SqlExecutor for QueryExecutor {
    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        debug!("쿼리 실행: {}", sql.trim());
        trace!("파라미터: {:?}", params);
        let result = self.client.execute(sql, params).await?;

        Ok(result)
    }

    async fn query_strings(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Option<String>>> {
        self.query_mapped(sql, params, |row| row.try_get::<_, Option<String>>(0))
            .await
    }

    async fn query_f64(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Option<f64>>> {
        self.query_mapped(sql, params, |row| row.try_get::<_, Option<f64>>(0))
            .await
    }

    async fn query_i64(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<i64>> {
        self.query_mapped(sql, params, |row| row.try_get::<_, i64>(0))
            .await
    }
}
