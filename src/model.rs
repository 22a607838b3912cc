// 모델 구성과 산출물 이름

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ARTIFACT_PREFIX_SUFFIX, METRICS_MSE_SUFFIX, METRICS_SUFFIX, MODEL_SUFFIX,
    MODEL_SUMMARY_SUFFIX, PREDICTIONS_SUFFIX,
};
use crate::db::ident::TableName;
use crate::error::{EvalError, Result};
use crate::features::FeatureVector;

/// GLM 분포 계열
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Gaussian,
    Poisson,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Gaussian => "gaussian",
            Family::Poisson => "poisson",
        }
    }
}

/// GLM 연결 함수
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Identity,
    Log,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Link::Identity => "identity",
            Link::Log => "log",
        }
    }
}

/// 모델 종류
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelKind {
    /// 최소제곱 선형 회귀
    Linear,
    /// 일반화 선형 모델
    Glm { family: Family, link: Link },
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Linear => f.write_str("linear"),
            ModelKind::Glm { family, link } => {
                write!(f, "glm({}, {})", family.as_str(), link.as_str())
            }
        }
    }
}

/// 모델 구성
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub kind: ModelKind,
    /// 모델별 특성 벡터. 없으면 파이프라인 공통 벡터 사용
    #[serde(default)]
    pub features: Option<FeatureVector>,
    #[serde(default)]
    pub max_iter: Option<u32>,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl ModelConfig {
    pub fn linear(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            kind: ModelKind::Linear,
            features: None,
            max_iter: None,
            tolerance: None,
        }
    }

    pub fn glm(name: &str, family: Family, link: Link) -> Self {
        Self {
            kind: ModelKind::Glm { family, link },
            ..Self::linear(name)
        }
    }

    /// 기본 모델 목록: 선형 회귀, gaussian/identity GLM
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::linear("linear"),
            Self::glm("glm", Family::Gaussian, Link::Identity),
        ]
    }

    /// 출력용 이름
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match self.name.as_str() {
            "linear" => "LINEAR REGRESSION".to_string(),
            other => other.to_uppercase(),
        }
    }

    /// MADlib family 파라미터 (`family=gaussian, link=identity`)
    pub fn family_params(&self) -> Option<String> {
        match self.kind {
            ModelKind::Linear => None,
            ModelKind::Glm { family, link } => Some(format!(
                "family={}, link={}",
                family.as_str(),
                link.as_str()
            )),
        }
    }

    /// MADlib 최적화 파라미터
    pub fn optim_params(&self) -> Option<String> {
        let mut params = Vec::new();
        if let Some(max_iter) = self.max_iter {
            params.push(format!("max_iter={}", max_iter));
        }
        if let Some(tolerance) = self.tolerance {
            params.push(format!("tolerance={}", tolerance));
        }
        if params.is_empty() {
            None
        } else {
            Some(params.join(", "))
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_name {
            return Err(EvalError::Config(format!(
                "모델 이름은 소문자, 숫자, '_' 만 허용: {:?}",
                self.name
            )));
        }
        if let Some(tolerance) = self.tolerance {
            if !(tolerance.is_finite() && tolerance > 0.0) {
                return Err(EvalError::Config(format!(
                    "모델 {} 의 tolerance 가 유효하지 않음: {}",
                    self.name, tolerance
                )));
            }
        }
        if let Some(features) = &self.features {
            features.validate()?;
        }
        Ok(())
    }
}

/// 모델 하나의 산출물 테이블 이름
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactNames {
    pub model: TableName,
    pub model_summary: TableName,
    pub predictions: TableName,
    pub metrics: TableName,
    pub metrics_mse: TableName,
}

impl ArtifactNames {
    /// `{schema}.{name}_evaltest_*` 이름 생성
    pub fn for_model(schema: &str, name: &str) -> Self {
        let prefix = TableName::new(Some(schema), &format!("{}{}", name, ARTIFACT_PREFIX_SUFFIX));
        Self {
            model: prefix.with_suffix(MODEL_SUFFIX),
            model_summary: prefix.with_suffix(MODEL_SUMMARY_SUFFIX),
            predictions: prefix.with_suffix(PREDICTIONS_SUFFIX),
            metrics: prefix.with_suffix(METRICS_SUFFIX),
            metrics_mse: prefix.with_suffix(METRICS_MSE_SUFFIX),
        }
    }

    /// 삭제 순서대로 나열
    pub fn all(&self) -> [&TableName; 5] {
        [
            &self.model,
            &self.model_summary,
            &self.predictions,
            &self.metrics,
            &self.metrics_mse,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_evaltest_prefix() {
        let names = ArtifactNames::for_model("public", "glm");
        assert_eq!(names.model.plain(), "public.glm_evaltest_model");
        assert_eq!(names.model_summary.plain(), "public.glm_evaltest_model_summary");
        assert_eq!(names.predictions.plain(), "public.glm_evaltest_predictions");
        assert_eq!(names.metrics.plain(), "public.glm_evaltest_metrics");
        assert_eq!(names.metrics_mse.plain(), "public.glm_evaltest_metrics_mse");
    }

    #[test]
    fn display_names_match_console_labels() {
        let models = ModelConfig::defaults();
        assert_eq!(models[0].display_name(), "LINEAR REGRESSION");
        assert_eq!(models[1].display_name(), "GLM");
    }

    #[test]
    fn glm_params_render_family_and_optimizer() {
        let mut glm = ModelConfig::glm("glm", Family::Poisson, Link::Log);
        assert_eq!(
            glm.family_params().as_deref(),
            Some("family=poisson, link=log")
        );
        assert_eq!(glm.optim_params(), None);

        glm.max_iter = Some(50);
        glm.tolerance = Some(0.001);
        assert_eq!(
            glm.optim_params().as_deref(),
            Some("max_iter=50, tolerance=0.001")
        );
        assert_eq!(ModelConfig::linear("linear").family_params(), None);
    }

    #[test]
    fn parses_models_from_yaml() {
        let yaml = "
- name: linear
  kind: linear
- name: glm
  kind: glm
  family: gaussian
  link: identity
  max_iter: 25
";
        let models: Vec<ModelConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(models[0].kind, ModelKind::Linear);
        assert_eq!(
            models[1].kind,
            ModelKind::Glm {
                family: Family::Gaussian,
                link: Link::Identity
            }
        );
        assert_eq!(models[1].max_iter, Some(25));
    }

    #[test]
    fn rejects_names_unsafe_for_tables() {
        assert!(ModelConfig::linear("Linear Model").validate().is_err());
        assert!(ModelConfig::linear("").validate().is_err());
        assert!(ModelConfig::linear("ols_2").validate().is_ok());
    }
}
