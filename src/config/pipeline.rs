use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::db::ident::{is_plain_ident, TableName};
use crate::error::{EvalError, Result};
use crate::features::FeatureVector;
use crate::model::ModelConfig;

/// 파티션 테이블 분산 방식 (Greenplum)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Randomly,
    Replicated,
    /// 분산 절 생략 (일반 PostgreSQL)
    None,
}

impl Distribution {
    pub fn clause(&self) -> Option<&'static str> {
        match self {
            Distribution::Randomly => Some("DISTRIBUTED RANDOMLY"),
            Distribution::Replicated => Some("DISTRIBUTED REPLICATED"),
            Distribution::None => None,
        }
    }
}

/// 모델 실패 처리 방식
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 첫 실패에서 중단
    FailFast,
    /// 실패를 기록하고 다음 모델 계속
    Isolate,
}

/// 동네별 파티션 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub source_table: TableName,
    pub neighborhood_column: String,
    pub target_schema: String,
    pub distribution: Distribution,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            source_table: TableName::new(Some("public"), "training_bronze"),
            neighborhood_column: "neighborhood".to_string(),
            target_schema: "training_silver_hoods".to_string(),
            distribution: Distribution::Randomly,
        }
    }
}

/// 모델 평가 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub train_table: TableName,
    pub test_table: TableName,
    pub id_column: String,
    pub target_column: String,
    pub artifact_schema: String,
    pub failure_policy: FailurePolicy,
    pub features: FeatureVector,
    pub models: Vec<ModelConfig>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            train_table: TableName::new(Some("public"), "training_silver_halfdata"),
            test_table: TableName::new(Some("public"), "training_bronze"),
            id_column: "id".to_string(),
            target_column: "saleprice".to_string(),
            artifact_schema: "public".to_string(),
            failure_policy: FailurePolicy::FailFast,
            features: FeatureVector::housing(),
            models: ModelConfig::defaults(),
        }
    }
}

impl EvaluationConfig {
    /// 모델에 적용할 특성 벡터
    pub fn features_for<'a>(&'a self, model: &'a ModelConfig) -> &'a FeatureVector {
        model.features.as_ref().unwrap_or(&self.features)
    }
}

/// 파이프라인 설정
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub partition: PartitionConfig,
    pub evaluation: EvaluationConfig,
}

impl PipelineConfig {
    /// 설정 파일에서 파이프라인 설정 로드
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("파이프라인 설정 파일 로드: {}", path.display());

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: PipelineConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.partition.target_schema.trim().is_empty() {
            return Err(EvalError::Config("partition.target_schema 가 비어 있음".into()));
        }
        if self.partition.neighborhood_column.is_empty() {
            return Err(EvalError::Config("partition.neighborhood_column 이 비어 있음".into()));
        }

        let evaluation = &self.evaluation;
        if evaluation.id_column.is_empty() || evaluation.target_column.is_empty() {
            return Err(EvalError::Config("evaluation.id_column / target_column 이 비어 있음".into()));
        }
        if !is_plain_ident(&evaluation.artifact_schema) {
            return Err(EvalError::Config(format!(
                "evaluation.artifact_schema 는 소문자, 숫자, '_' 만 허용: {:?}",
                evaluation.artifact_schema
            )));
        }
        evaluation.features.validate()?;

        if evaluation.models.is_empty() {
            return Err(EvalError::Config("evaluation.models 가 비어 있음".into()));
        }
        let mut names = HashSet::new();
        for model in &evaluation.models {
            model.validate()?;
            if !names.insert(model.name.as_str()) {
                return Err(EvalError::Config(format!("중복 모델 이름: {}", model.name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Family, Link, ModelKind};
    use std::io::Write;

    #[test]
    fn defaults_match_housing_tables() {
        let config = PipelineConfig::default();
        assert_eq!(config.partition.source_table.plain(), "public.training_bronze");
        assert_eq!(config.partition.target_schema, "training_silver_hoods");
        assert_eq!(
            config.partition.distribution.clause(),
            Some("DISTRIBUTED RANDOMLY")
        );
        assert_eq!(config.evaluation.train_table.plain(), "public.training_silver_halfdata");
        assert_eq!(config.evaluation.test_table.plain(), "public.training_bronze");
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.evaluation.models.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "
partition:
  distribution: none
evaluation:
  failure_policy: isolate
  models:
    - name: poisson
      kind: glm
      family: poisson
      link: log
"
        )
        .unwrap();

        let config = PipelineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.partition.distribution.clause(), None);
        assert_eq!(config.partition.neighborhood_column, "neighborhood");
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.evaluation.target_column, "saleprice");
        assert_eq!(
            config.evaluation.models[0].kind,
            ModelKind::Glm {
                family: Family::Poisson,
                link: Link::Log
            }
        );
    }

    #[test]
    fn mixed_case_table_names_are_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "evaluation:\n  train_table: public.Training_Silver\n").unwrap();
        assert!(PipelineConfig::load_from_file(file.path()).is_err());

        let mut config = PipelineConfig::default();
        config.evaluation.artifact_schema = "Models".into();
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn duplicate_model_names_are_rejected() {
        let mut config = PipelineConfig::default();
        config.evaluation.models = vec![ModelConfig::linear("m"), ModelConfig::linear("m")];
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn model_features_override_shared_vector() {
        let mut config = EvaluationConfig::default();
        let mut model = ModelConfig::linear("small");
        model.features = Some(FeatureVector::new(vec![], false));
        assert!(config.features_for(&model).columns.is_empty());

        config.models = vec![ModelConfig::linear("linear")];
        assert_eq!(config.features_for(&config.models[0]).columns.len(), 36);
    }
}
