use clap::ValueEnum;
use serde_json::json;

use super::{EvaluationReport, ModelFailure};
use crate::constants::{R2_PRECISION, RMSE_PRECISION};
use crate::db::partition::PartitionSummary;
use crate::error::Result;

/// 콘솔 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// 사람이 읽는 문장
    #[default]
    Text,
    /// key=value 한 줄
    Kv,
    /// 한 줄에 JSON 객체 하나
    Json,
}

/// 리포트 포맷터 - 결과를 출력 줄로 변환
pub struct ReportFormatter {
    format: ReportFormat,
}

impl ReportFormatter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// 모델 평가 결과 한 줄
    pub fn evaluation(&self, report: &EvaluationReport) -> Result<String> {
        let line = match self.format {
            ReportFormat::Text => format!(
                "{} 결과 → R²: {:.r2$}, RMSE: {:.rmse$}",
                report.display_name,
                report.r2,
                report.rmse,
                r2 = R2_PRECISION,
                rmse = RMSE_PRECISION
            ),
            ReportFormat::Kv => format!(
                "model={} kind={} r2={:.r2$} rmse={:.rmse$} predictions={}",
                report.model,
                report.kind.replace(' ', ""),
                report.r2,
                report.rmse,
                report.predictions,
                r2 = R2_PRECISION,
                rmse = RMSE_PRECISION
            ),
            ReportFormat::Json => serde_json::to_string(report)?,
        };
        Ok(line)
    }

    /// 실패한 모델 한 줄
    pub fn failure(&self, failure: &ModelFailure) -> Result<String> {
        let line = match self.format {
            ReportFormat::Text => format!("{} 실패: {}", failure.model, failure.error.full_message()),
            ReportFormat::Kv => format!(
                "model={} status=failed error={:?}",
                failure.model,
                failure.error.full_message()
            ),
            ReportFormat::Json => serde_json::to_string(&json!({
                "model": failure.model,
                "status": "failed",
                "error": failure.error.full_message(),
            }))?,
        };
        Ok(line)
    }

    /// 파티션 결과 (파티션당 한 줄 + 요약 한 줄)
    pub fn partitions(&self, summary: &PartitionSummary) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(summary.partitions.len() + 1);
        for partition in &summary.partitions {
            let line = match self.format {
                ReportFormat::Text => format!(
                    "{} -> {} ({} 행)",
                    partition.neighborhood,
                    partition.table.plain(),
                    partition.rows
                ),
                ReportFormat::Kv => format!(
                    "neighborhood={:?} table={} rows={}",
                    partition.neighborhood,
                    partition.table.plain(),
                    partition.rows
                ),
                ReportFormat::Json => serde_json::to_string(&json!({
                    "neighborhood": partition.neighborhood,
                    "table": partition.table.plain(),
                    "rows": partition.rows,
                }))?,
            };
            lines.push(line);
        }

        let total = match self.format {
            ReportFormat::Text => format!(
                "동네 테이블 {} 개 생성 완료 (스키마 {}, NULL 동네 {} 건 제외)",
                summary.partitions.len(),
                summary.schema,
                summary.skipped_null
            ),
            ReportFormat::Kv => format!(
                "schema={} tables={} skipped_null={}",
                summary.schema,
                summary.partitions.len(),
                summary.skipped_null
            ),
            ReportFormat::Json => serde_json::to_string(&json!({
                "schema": summary.schema,
                "tables": summary.partitions.len(),
                "skipped_null": summary.skipped_null,
            }))?,
        };
        lines.push(total);

        Ok(lines)
    }
}
