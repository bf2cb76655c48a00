//! 설정 관리 — conntrail.toml 파싱 및 런타임 설정
//!
//! [`ConntrailConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`CONNTRAIL_INGEST_SYSLOG_BIND=0.0.0.0:5514` 형식)
//! 2. 설정 파일 (`conntrail.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), conntrail_core::error::ConntrailError> {
//! use conntrail_core::config::ConntrailConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ConntrailConfig::load("conntrail.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ConntrailConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConntrailError};

/// Conntrail 통합 설정
///
/// `conntrail.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConntrailConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집(ingest) 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 로그 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// Identity Resolver 설정
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl ConntrailConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConntrailError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConntrailError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConntrailError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ConntrailError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ConntrailError> {
        toml::from_str(toml_str).map_err(|e| {
            ConntrailError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CONNTRAIL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CONNTRAIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "CONNTRAIL_GENERAL_LOG_FORMAT");

        // Ingest
        override_bool(&mut self.ingest.enabled, "CONNTRAIL_INGEST_ENABLED");
        override_string(&mut self.ingest.syslog_bind, "CONNTRAIL_INGEST_SYSLOG_BIND");
        override_usize(
            &mut self.ingest.channel_capacity,
            "CONNTRAIL_INGEST_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.ingest.max_message_size,
            "CONNTRAIL_INGEST_MAX_MESSAGE_SIZE",
        );
        override_i32(
            &mut self.ingest.utc_offset_hours,
            "CONNTRAIL_INGEST_UTC_OFFSET_HOURS",
        );

        // Storage
        override_string(&mut self.storage.base_dir, "CONNTRAIL_STORAGE_BASE_DIR");

        // Resolver
        override_string(
            &mut self.resolver.registry_path,
            "CONNTRAIL_RESOLVER_REGISTRY_PATH",
        );
        override_u64(
            &mut self.resolver.refresh_interval_secs,
            "CONNTRAIL_RESOLVER_REFRESH_INTERVAL_SECS",
        );
        override_u64(
            &mut self.resolver.fetch_timeout_secs,
            "CONNTRAIL_RESOLVER_FETCH_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConntrailError> {
        // 유효한 UTC 오프셋 범위
        const MAX_UTC_OFFSET_HOURS: i32 = 14;

        if self.ingest.syslog_bind.is_empty() {
            return Err(invalid("ingest.syslog_bind", "must not be empty"));
        }
        if self.ingest.channel_capacity == 0 {
            return Err(invalid("ingest.channel_capacity", "must be greater than 0"));
        }
        if self.ingest.max_message_size == 0 || self.ingest.max_message_size > 65_535 {
            return Err(invalid("ingest.max_message_size", "must be 1-65535"));
        }
        if self.ingest.utc_offset_hours.abs() > MAX_UTC_OFFSET_HOURS {
            return Err(invalid("ingest.utc_offset_hours", "must be within -14..=14"));
        }
        if self.storage.base_dir.is_empty() {
            return Err(invalid("storage.base_dir", "must not be empty"));
        }
        if self.resolver.refresh_interval_secs == 0 {
            return Err(invalid(
                "resolver.refresh_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.resolver.fetch_timeout_secs == 0 {
            return Err(invalid(
                "resolver.fetch_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConntrailError {
    ConntrailError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    })
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace/debug/info/warn/error)
    pub log_level: String,
    /// 로그 포맷 (json/pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 수집 활성화 여부
    pub enabled: bool,
    /// Syslog UDP 바인드 주소
    pub syslog_bind: String,
    /// 수집기 → 파이프라인 채널 용량
    pub channel_capacity: usize,
    /// 최대 데이터그램 크기 (바이트)
    pub max_message_size: usize,
    /// 타임스탬프/파티션 계산에 쓰는 UTC 오프셋 (시간)
    pub utc_offset_hours: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            syslog_bind: "0.0.0.0:514".to_owned(),
            channel_capacity: 1024,
            max_message_size: 8192,
            utc_offset_hours: 6,
        }
    }
}

/// 로그 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 라우터별 로그 파티션의 루트 디렉토리
    pub base_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: "logs".to_owned(),
        }
    }
}

/// Identity Resolver 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 라우터 레지스트리 파일 경로
    pub registry_path: String,
    /// 주기적 세션 갱신 간격 (초)
    pub refresh_interval_secs: u64,
    /// 관리 인터페이스 호출 타임아웃 (초)
    pub fetch_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry_path: "routers.toml".to_owned(),
            refresh_interval_secs: 600,
            fetch_timeout_secs: 10,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-boolean env override"),
        }
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric env override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric env override"),
        }
    }
}

fn override_i32(target: &mut i32, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric env override"),
        }
    }
}
