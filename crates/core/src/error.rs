//! 에러 타입 — 도메인별 에러 정의

/// Conntrail 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ConntrailError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 라우터 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline not running")]
    NotRunning,
}

/// 라우터 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 레지스트리 파일을 찾을 수 없음
    #[error("registry file not found: {path}")]
    FileNotFound { path: String },

    /// 레지스트리 파싱 실패
    #[error("failed to parse registry: {reason}")]
    ParseFailed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "syslog_bind".to_owned(),
            reason: "empty".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("syslog_bind"));
        assert!(msg.contains("empty"));
    }

    #[test]
    fn pipeline_error_wraps_into_top_level() {
        let err: ConntrailError = PipelineError::AlreadyRunning.into();
        assert!(matches!(err, ConntrailError::Pipeline(_)));
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn registry_error_display() {
        let err = RegistryError::FileNotFound {
            path: "/etc/conntrail/routers.toml".to_owned(),
        };
        assert!(err.to_string().contains("routers.toml"));
    }

    #[test]
    fn io_error_wraps_into_top_level() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConntrailError = io.into();
        assert!(matches!(err, ConntrailError::Io(_)));
    }
}
