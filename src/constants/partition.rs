// 동네별 파티션 관련 SQL 쿼리

use crate::db::ident::{quote_ident, TableName};

/// 대상 스키마 삭제 쿼리
pub fn drop_schema(schema: &str) -> String {
    format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(schema))
}

/// 대상 스키마 생성 쿼리
pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA {}", quote_ident(schema))
}

/// NULL 이 아닌 동네 목록 조회 쿼리
pub fn list_neighborhoods(source: &TableName, column: &str) -> String {
    let column = quote_ident(column);
    format!(
        "SELECT DISTINCT {col} FROM {src} WHERE {col} IS NOT NULL ORDER BY {col}",
        col = column,
        src = source
    )
}

/// 동네 값이 NULL 인 행 수 조회 쿼리
pub fn count_null_neighborhoods(source: &TableName, column: &str) -> String {
    format!(
        "SELECT count(*) FROM {} WHERE {} IS NULL",
        source,
        quote_ident(column)
    )
}

/// 원본과 같은 구조의 빈 파티션 테이블 생성 쿼리
pub fn create_partition_table(
    table: &TableName,
    source: &TableName,
    distribution: Option<&str>,
) -> String {
    match distribution {
        Some(clause) => format!(
            "CREATE TABLE {} AS SELECT * FROM {} WITH NO DATA {}",
            table, source, clause
        ),
        None => format!("CREATE TABLE {} AS SELECT * FROM {} WITH NO DATA", table, source),
    }
}

/// 동네 값($1)에 해당하는 행 적재 쿼리
pub fn insert_partition_rows(table: &TableName, source: &TableName, column: &str) -> String {
    format!(
        "INSERT INTO {} SELECT * FROM {} WHERE {} = $1",
        table,
        source,
        quote_ident(column)
    )
}
