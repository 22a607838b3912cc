use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_IDENT_LEN;
use crate::error::EvalError;

/// SQL 식별자 인용
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 인용 없이도 같은 이름으로 해석되는 식별자인지 확인
///
/// 소문자, 숫자, `_` 만 허용하고 숫자로 시작하지 않으며 63 바이트 이하여야 한다.
pub fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    valid_start
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= MAX_IDENT_LEN
}

/// 스키마 포함 테이블 이름
///
/// `Display` 는 인용된 식별자를, `plain` 은 MADlib 인자로 넘길 비인용 형식을 만든다.
/// MADlib 은 비인용 이름을 소문자로 해석하므로 설정에서 읽는 이름은
/// `is_plain_ident` 를 만족해야 한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 비인용 `schema.name`
    pub fn plain(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// 같은 스키마에 접미사를 붙인 테이블
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            schema: self.schema.clone(),
            name: format!("{}{}", self.name, suffix),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => f.write_str(&quote_ident(&self.name)),
        }
    }
}

impl FromStr for TableName {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (schema, name) = match s.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, s),
        };
        if name.is_empty() || schema.is_some_and(str::is_empty) || name.contains('.') {
            return Err(EvalError::Config(format!("잘못된 테이블 이름: {:?}", s)));
        }
        if !is_plain_ident(name) || !schema.map_or(true, is_plain_ident) {
            return Err(EvalError::Config(format!(
                "테이블 이름은 소문자, 숫자, '_' 만 허용: {:?}",
                s
            )));
        }
        Ok(Self::new(schema, name))
    }
}

impl TryFrom<String> for TableName {
    type Error = EvalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.plain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes_identifiers() {
        assert_eq!(quote_ident("1stFlrSF"), "\"1stFlrSF\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn parses_schema_qualified_names() {
        let table: TableName = "public.training_bronze".parse().unwrap();
        assert_eq!(table.schema(), Some("public"));
        assert_eq!(table.name(), "training_bronze");
        assert_eq!(table.to_string(), "\"public\".\"training_bronze\"");
        assert_eq!(table.plain(), "public.training_bronze");
        assert_eq!(
            table.with_suffix("_mse").plain(),
            "public.training_bronze_mse"
        );
    }

    #[test]
    fn rejects_malformed_names() {
        assert!("".parse::<TableName>().is_err());
        assert!(".x".parse::<TableName>().is_err());
        assert!("a.b.c".parse::<TableName>().is_err());
    }

    #[test]
    fn rejects_names_that_case_fold_differently_when_unquoted() {
        let err = "public.Training_Bronze".parse::<TableName>().unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
        assert!("Public.training_bronze".parse::<TableName>().is_err());
        assert!("public.1st_table".parse::<TableName>().is_err());
        assert!("public.\"quoted\"".parse::<TableName>().is_err());

        let table: TableName = "public.training_2024".parse().unwrap();
        assert_eq!(table.to_string(), "\"public\".\"training_2024\"");
    }
}
