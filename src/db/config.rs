use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 데이터베이스 연결 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

/// 데이터베이스 설정
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbConfig {
    pub connection: ConnectionConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "housing".to_string(),
                user: "gpadmin".to_string(),
                password: None,
                connection_timeout_seconds: default_connection_timeout(),
            },
        }
    }
}

impl DbConfig {
    /// 설정 파일에서 DB 설정 로드
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("DB 설정 파일 로드: {}", path.display());

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: DbConfig = serde_yaml::from_str(&contents)?;
        info!("DB 설정 로드 완료: {}", config.describe());

        Ok(config)
    }

    /// 로그용 연결 대상 (비밀번호 제외)
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.connection.user,
            self.connection.host,
            self.connection.port,
            self.connection.database
        )
    }

    /// 연결 제한 시간 설정 가져오기
    pub fn get_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.connection_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_target_local_housing_database() {
        let config = DbConfig::default();
        assert_eq!(config.describe(), "gpadmin@localhost:5432/housing");
        assert_eq!(config.get_connection_timeout(), Duration::from_secs(30));
        assert!(config.connection.password.is_none());
    }

    #[test]
    fn loads_yaml_with_optional_fields_defaulted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "connection:\n  host: gp-master\n  port: 6432\n  database: warehouse\n  user: analyst"
        )
        .unwrap();

        let config = DbConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.connection.host, "gp-master");
        assert_eq!(config.connection.port, 6432);
        assert_eq!(config.connection.connection_timeout_seconds, 30);
        assert!(config.connection.password.is_none());
    }
}
