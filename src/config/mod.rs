// 통합 설정
//
// DB 연결 설정과 파이프라인 설정을 한 번 로드해 각 단계에 명시적으로 전달한다.

pub mod pipeline;

use std::env;
use std::path::{Path, PathBuf};

use log::info;

use crate::constants::{DB_CONFIG_FILE, PIPELINE_CONFIG_FILE};
use crate::db::config::DbConfig;
use crate::error::{EvalError, Result};

pub use pipeline::{Distribution, EvaluationConfig, FailurePolicy, PartitionConfig, PipelineConfig};

/// 설정 소스
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// 환경 변수
    Environment,
    /// 설정 파일
    File,
    /// 기본값
    Default,
}

impl ConfigSource {
    fn describe(&self) -> &'static str {
        match self {
            ConfigSource::Environment => "환경 변수",
            ConfigSource::File => "설정 파일",
            ConfigSource::Default => "기본값",
        }
    }
}

/// 통합 설정 관리자
#[derive(Clone, Debug)]
pub struct Settings {
    /// 데이터베이스 설정
    pub database: DbConfig,
    /// 파이프라인 설정
    pub pipeline: PipelineConfig,
    /// 데이터베이스 설정 소스
    pub db_source: ConfigSource,
    /// 파이프라인 설정 소스
    pub pipeline_source: ConfigSource,
}

impl Settings {
    /// 설정 로드
    ///
    /// 우선순위: 명시 경로 → `DB_CONFIG_FILE` / `PIPELINE_CONFIG_FILE` → 현재 디렉토리 파일 → 기본값.
    /// 명시되었거나 환경 변수로 지정된 파일을 읽지 못하면 에러다.
    pub fn load(db_path: Option<&Path>, pipeline_path: Option<&Path>) -> Result<Self> {
        let (database, db_source) = Self::load_db_config(db_path)?;
        let (pipeline, pipeline_source) = Self::load_pipeline_config(pipeline_path)?;

        let mut settings = Self {
            database,
            pipeline,
            db_source,
            pipeline_source,
        };
        settings.override_from_env()?;
        settings.pipeline.validate()?;

        Ok(settings)
    }

    fn explicit_path(given: Option<&Path>, var: &str) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = given {
            return Some((path.to_path_buf(), ConfigSource::File));
        }
        env::var(var)
            .ok()
            .map(|path| (PathBuf::from(path), ConfigSource::Environment))
    }

    /// 데이터베이스 설정 로드
    fn load_db_config(given: Option<&Path>) -> Result<(DbConfig, ConfigSource)> {
        if let Some((path, source)) = Self::explicit_path(given, "DB_CONFIG_FILE") {
            return Ok((DbConfig::load_from_file(&path)?, source));
        }

        if Path::new(DB_CONFIG_FILE).exists() {
            return Ok((DbConfig::load_from_file(DB_CONFIG_FILE)?, ConfigSource::File));
        }

        info!("DB 설정 파일을 찾을 수 없어 기본 설정 사용");
        Ok((DbConfig::default(), ConfigSource::Default))
    }

    /// 파이프라인 설정 로드
    fn load_pipeline_config(given: Option<&Path>) -> Result<(PipelineConfig, ConfigSource)> {
        if let Some((path, source)) = Self::explicit_path(given, "PIPELINE_CONFIG_FILE") {
            return Ok((PipelineConfig::load_from_file(&path)?, source));
        }

        if Path::new(PIPELINE_CONFIG_FILE).exists() {
            return Ok((
                PipelineConfig::load_from_file(PIPELINE_CONFIG_FILE)?,
                ConfigSource::File,
            ));
        }

        info!("파이프라인 설정 파일을 찾을 수 없어 기본 설정 사용");
        Ok((PipelineConfig::default(), ConfigSource::Default))
    }

    /// 환경 변수에서 설정 값 오버라이드
    pub fn override_from_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// 조회 함수로 설정 값 오버라이드
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 데이터베이스 설정 오버라이드
        if let Some(host) = lookup("DB_HOST") {
            info!("환경 변수에서 DB 호스트 설정: {}", host);
            self.database.connection.host = host;
            self.db_source = ConfigSource::Environment;
        }

        if let Some(port) = lookup("DB_PORT") {
            let port = port.parse::<u16>().map_err(|_| {
                EvalError::Config(format!("DB_PORT 값이 유효한 포트 번호가 아님: {}", port))
            })?;
            info!("환경 변수에서 DB 포트 설정: {}", port);
            self.database.connection.port = port;
            self.db_source = ConfigSource::Environment;
        }

        if let Some(name) = lookup("DB_NAME") {
            info!("환경 변수에서 DB 이름 설정: {}", name);
            self.database.connection.database = name;
            self.db_source = ConfigSource::Environment;
        }

        if let Some(user) = lookup("DB_USER") {
            info!("환경 변수에서 DB 사용자 설정: {}", user);
            self.database.connection.user = user;
            self.db_source = ConfigSource::Environment;
        }

        if let Some(password) = lookup("DB_PASSWORD") {
            info!("환경 변수에서 DB 비밀번호 설정");
            self.database.connection.password = Some(password);
            self.db_source = ConfigSource::Environment;
        }

        // 학습/테스트 테이블 오버라이드
        if let Some(table) = lookup("TRAIN_TABLE") {
            info!("환경 변수에서 학습 테이블 설정: {}", table);
            self.pipeline.evaluation.train_table = table.parse()?;
            self.pipeline_source = ConfigSource::Environment;
        }

        if let Some(table) = lookup("TEST_TABLE") {
            info!("환경 변수에서 테스트 테이블 설정: {}", table);
            self.pipeline.evaluation.test_table = table.parse()?;
            self.pipeline_source = ConfigSource::Environment;
        }

        Ok(())
    }

    /// 설정 정보 로그 출력
    pub fn log_settings(&self) {
        info!("데이터베이스 설정 소스: {}", self.db_source.describe());
        info!("파이프라인 설정 소스: {}", self.pipeline_source.describe());
        info!("데이터베이스 연결: {}", self.database.describe());

        let evaluation = &self.pipeline.evaluation;
        info!(
            "학습 테이블: {}, 테스트 테이블: {}, 모델 {} 개",
            evaluation.train_table.plain(),
            evaluation.test_table.plain(),
            evaluation.models.len()
        );
    }
}
