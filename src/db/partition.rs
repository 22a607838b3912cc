use std::collections::{HashMap, HashSet};

use log::{debug, error, info, warn};

use super::ident::TableName;
use super::query::SqlExecutor;
use crate::config::PartitionConfig;
use crate::constants::{partition, MAX_IDENT_LEN};
use crate::error::{EvalError, Result};

/// 동네 값을 테이블 이름으로 변환 (소문자, 공백 → `_`)
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

/// 생성할 파티션 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPartition {
    pub neighborhood: String,
    pub table: TableName,
}

/// 파티션 생성 계획
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub partitions: Vec<PlannedPartition>,
    pub skipped_null: u64,
}

impl PartitionPlan {
    /// 동네 목록에서 계획 생성
    ///
    /// 목록 순서(DB 정렬 순서)를 유지하며 중복을 제거하고 이름 충돌을 검사한다.
    /// 충돌이나 식별자 길이 초과가 있으면 어떤 테이블도 만들기 전에 실패한다.
    pub fn build(schema: &str, labels: Vec<String>, skipped_null: u64) -> Result<Self> {
        let mut listed = HashSet::new();
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut partitions = Vec::with_capacity(labels.len());

        for label in labels {
            if !listed.insert(label.clone()) {
                continue;
            }
            let name = normalize_label(&label);
            if name.trim_matches('_').is_empty() || name.len() > MAX_IDENT_LEN {
                return Err(EvalError::InvalidLabel(label));
            }
            let table = TableName::new(Some(schema), &name);
            if let Some(first) = seen.get(&name) {
                return Err(EvalError::NameCollision {
                    first: first.clone(),
                    second: label,
                    table: table.plain(),
                });
            }
            seen.insert(name, label.clone());
            partitions.push(PlannedPartition {
                neighborhood: label,
                table,
            });
        }

        Ok(Self {
            partitions,
            skipped_null,
        })
    }
}

/// 생성된 파티션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPartition {
    pub neighborhood: String,
    pub table: TableName,
    pub rows: u64,
}

/// 파티션 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub schema: String,
    pub partitions: Vec<CreatedPartition>,
    pub skipped_null: u64,
}

/// 동네별 파티션 관리자 구조체
pub struct Partitioner<'a, X: SqlExecutor> {
    executor: &'a X,
    config: &'a PartitionConfig,
}

impl<'a, X: SqlExecutor> Partitioner<'a, X> {
    /// 새 Partitioner 인스턴스 생성
    pub fn new(executor: &'a X, config: &'a PartitionConfig) -> Self {
        Self { executor, config }
    }

    /// 동네 목록 조회
    async fn list_neighborhoods(&self) -> Result<Vec<String>> {
        let sql = partition::list_neighborhoods(
            &self.config.source_table,
            &self.config.neighborhood_column,
        );
        let labels = self.executor.query_strings(&sql, &[]).await?;
        Ok(labels.into_iter().flatten().collect())
    }

    /// 동네 값이 NULL 인 행 수 조회
    async fn count_null_rows(&self) -> Result<u64> {
        let sql = partition::count_null_neighborhoods(
            &self.config.source_table,
            &self.config.neighborhood_column,
        );
        let count = self.executor.query_i64(&sql, &[]).await?;
        Ok(count.first().map_or(0, |c| (*c).max(0) as u64))
    }

    /// 대상 스키마 삭제 후 재생성
    async fn reset_schema(&self) -> Result<()> {
        let schema = &self.config.target_schema;
        info!("스키마 {} 재생성 중...", schema);
        self.executor.execute(&partition::drop_schema(schema), &[]).await?;
        self.executor.execute(&partition::create_schema(schema), &[]).await?;
        Ok(())
    }

    /// 단일 파티션 생성
    async fn create_partition(&self, planned: &PlannedPartition) -> Result<u64> {
        let source = &self.config.source_table;
        let create_sql = partition::create_partition_table(
            &planned.table,
            source,
            self.config.distribution.clause(),
        );
        self.executor.execute(&create_sql, &[]).await?;

        let insert_sql = partition::insert_partition_rows(
            &planned.table,
            source,
            &self.config.neighborhood_column,
        );
        let rows = self
            .executor
            .execute(&insert_sql, &[&planned.neighborhood])
            .await?;

        debug!("파티션 생성 완료: {} ({} 행)", planned.table.plain(), rows);
        Ok(rows)
    }

    /// 전체 파티션 생성
    ///
    /// 스키마 삭제는 되돌릴 수 없고 트랜잭션으로 묶지 않는다.
    /// 중간에 실패하면 그때까지 만든 테이블만 남는다.
    pub async fn run(&self) -> Result<PartitionSummary> {
        let labels = self.list_neighborhoods().await?;
        let skipped_null = self.count_null_rows().await?;
        let plan = PartitionPlan::build(&self.config.target_schema, labels, skipped_null)?;

        info!("동네 {} 개 발견", plan.partitions.len());
        if plan.skipped_null > 0 {
            warn!("동네 값이 NULL 인 {} 행은 파티션에서 제외됨", plan.skipped_null);
        }
        if plan.partitions.is_empty() {
            warn!(
                "{} 에 동네 값이 없어 빈 스키마만 생성합니다",
                self.config.source_table.plain()
            );
        }

        self.reset_schema().await?;

        let mut partitions = Vec::with_capacity(plan.partitions.len());
        for planned in &plan.partitions {
            info!(
                "동네 파티션 생성: {} -> {}",
                planned.neighborhood,
                planned.table.plain()
            );
            let rows = match self.create_partition(planned).await {
                Ok(rows) => rows,
                Err(e) => {
                    error!("파티션 생성 실패 - {}: {}", planned.neighborhood, e.full_message());
                    return Err(EvalError::Partition {
                        neighborhood: planned.neighborhood.clone(),
                        source: Box::new(e),
                    });
                }
            };
            partitions.push(CreatedPartition {
                neighborhood: planned.neighborhood.clone(),
                table: planned.table.clone(),
                rows,
            });
        }

        info!("동네 테이블 {} 개 생성 완료", partitions.len());
        Ok(PartitionSummary {
            schema: self.config.target_schema.clone(),
            partitions,
            skipped_null: plan.skipped_null,
        })
    }
}
