// 회귀 모델 특성 벡터
//
// 학습과 예측은 같은 `FeatureVector` 로부터 SQL 식과 인메모리 벡터를 만든다.
// 컬럼 순서와 NULL 대체값이 두 단계에서 달라지면 계수가 어긋나므로
// 학습 시점의 벡터는 `ModelHandle` 에 보관된다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::ident::quote_ident;
use crate::error::{EvalError, Result};

/// 하우징 데이터 숫자형 특성 (Id, SalePrice 제외)
pub const HOUSING_FEATURES: [&str; 36] = [
    "mssubclass",
    "lotfrontage",
    "lotarea",
    "overallqual",
    "overallcond",
    "yearbuilt",
    "yearremodadd",
    "masvnrarea",
    "bsmtfinsf1",
    "bsmtfinsf2",
    "bsmtunfsf",
    "totalbsmtsf",
    "1stFlrSF",
    "2ndFlrSF",
    "lowqualfinsf",
    "grlivarea",
    "bsmtfullbath",
    "bsmthalfbath",
    "fullbath",
    "halfbath",
    "bedroomabvgr",
    "kitchenabvgr",
    "totrmsabvgrd",
    "fireplaces",
    "garageyrblt",
    "garagecars",
    "garagearea",
    "wooddecksf",
    "openporchsf",
    "enclosedporch",
    "3SsnPorch",
    "screenporch",
    "poolarea",
    "miscval",
    "mosold",
    "yrsold",
];

/// 특성 컬럼 (이름, NULL 대체값)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    #[serde(default)]
    pub default: f64,
}

impl FeatureColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: 0.0,
        }
    }
}

fn default_intercept() -> bool {
    true
}

/// 순서가 고정된 특성 벡터
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(default = "default_intercept")]
    pub intercept: bool,
    pub columns: Vec<FeatureColumn>,
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::housing()
    }
}

impl FeatureVector {
    pub fn new(columns: Vec<FeatureColumn>, intercept: bool) -> Self {
        Self { intercept, columns }
    }

    /// 하우징 데이터 기본 특성 벡터
    pub fn housing() -> Self {
        Self::new(
            HOUSING_FEATURES.iter().map(|name| FeatureColumn::new(name)).collect(),
            default_intercept(),
        )
    }

    /// 절편 포함 벡터 길이
    pub fn len(&self) -> usize {
        self.columns.len() + usize::from(self.intercept)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 구성 검증: 빈 벡터, 중복 컬럼, 유한하지 않은 대체값 거부
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(EvalError::Config("특성 컬럼이 비어 있음".into()));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(EvalError::Config("빈 특성 컬럼 이름".into()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(EvalError::Config(format!("중복 특성 컬럼: {}", column.name)));
            }
            if !column.default.is_finite() {
                return Err(EvalError::Config(format!(
                    "특성 {} 의 대체값이 유한하지 않음",
                    column.name
                )));
            }
        }
        Ok(())
    }

    /// `ARRAY[1, COALESCE("col", 0), ...]` 형식의 SQL 식
    pub fn to_sql(&self) -> String {
        let mut items = Vec::with_capacity(self.len());
        if self.intercept {
            items.push("1".to_string());
        }
        items.extend(
            self.columns
                .iter()
                .map(|c| format!("COALESCE({}, {})", quote_ident(&c.name), c.default)),
        );
        format!("ARRAY[{}]", items.join(", "))
    }

    /// 행에서 특성 벡터 추출. NULL 이나 누락된 컬럼은 대체값으로 채운다
    pub fn extract<F>(&self, lookup: F) -> Vec<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut values = Vec::with_capacity(self.len());
        if self.intercept {
            values.push(1.0);
        }
        values.extend(
            self.columns
                .iter()
                .map(|c| lookup(&c.name).unwrap_or(c.default)),
        );
        values
    }
}
