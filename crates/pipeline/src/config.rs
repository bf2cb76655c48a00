//! 수집 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`ConntrailConfig`](conntrail_core::config::ConntrailConfig)에서
//! 파이프라인이 쓰는 필드를 평탄화한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use conntrail_core::config::ConntrailConfig;
//! use conntrail_pipeline::config::PipelineConfig;
//!
//! let core_config = ConntrailConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Syslog UDP 바인드 주소
    pub syslog_bind: String,
    /// 수집기 → 파이프라인 채널 용량
    pub channel_capacity: usize,
    /// 최대 데이터그램 크기 (바이트)
    pub max_message_size: usize,
    /// 타임스탬프/파티션 계산용 UTC 오프셋 (시간)
    pub utc_offset_hours: i32,
    /// 로그 파티션 루트 디렉토리
    pub base_dir: String,
    /// 세션 주기 갱신 간격 (초)
    pub refresh_interval_secs: u64,
    /// 세션 소스 호출 타임아웃 (초)
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            syslog_bind: "0.0.0.0:514".to_owned(),
            channel_capacity: 1024,
            max_message_size: 8192,
            utc_offset_hours: 6,
            base_dir: "logs".to_owned(),
            refresh_interval_secs: 600,
            fetch_timeout_secs: 10,
        }
    }
}

impl PipelineConfig {
    /// core의 `ConntrailConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &conntrail_core::config::ConntrailConfig) -> Self {
        Self {
            syslog_bind: core.ingest.syslog_bind.clone(),
            channel_capacity: core.ingest.channel_capacity,
            max_message_size: core.ingest.max_message_size,
            utc_offset_hours: core.ingest.utc_offset_hours,
            base_dir: core.storage.base_dir.clone(),
            refresh_interval_secs: core.resolver.refresh_interval_secs,
            fetch_timeout_secs: core.resolver.fetch_timeout_secs,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_UTC_OFFSET_HOURS: i32 = 14;
        const MAX_DATAGRAM_SIZE: usize = 65_535;

        if self.syslog_bind.is_empty() {
            return Err(config_err("syslog_bind", "must not be empty"));
        }
        if self.channel_capacity == 0 {
            return Err(config_err("channel_capacity", "must be greater than 0"));
        }
        if self.max_message_size == 0 || self.max_message_size > MAX_DATAGRAM_SIZE {
            return Err(config_err("max_message_size", "must be 1-65535"));
        }
        if self.utc_offset_hours.abs() > MAX_UTC_OFFSET_HOURS {
            return Err(config_err("utc_offset_hours", "must be within -14..=14"));
        }
        if self.base_dir.is_empty() {
            return Err(config_err("base_dir", "must not be empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(config_err("refresh_interval_secs", "must be greater than 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(config_err("fetch_timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_err(field: &str, reason: &str) -> IngestError {
    IngestError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Syslog 바인드 주소를 설정합니다.
    pub fn syslog_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.syslog_bind = bind.into();
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 최대 데이터그램 크기를 설정합니다.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// UTC 오프셋(시간)을 설정합니다.
    pub fn utc_offset_hours(mut self, hours: i32) -> Self {
        self.config.utc_offset_hours = hours;
        self
    }

    /// 로그 루트 디렉토리를 설정합니다.
    pub fn base_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    /// 세션 갱신 간격(초)을 설정합니다.
    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.config.refresh_interval_secs = secs;
        self
    }

    /// 세션 소스 타임아웃(초)을 설정합니다.
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
