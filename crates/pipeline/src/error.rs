//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for ConntrailError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 파서와 검색의 "결과 없음"은 에러가 아니므로 여기에 없습니다
//! (파서는 `Option`, 검색은 `SearchOutcome`으로 표현).

use conntrail_core::error::{ConntrailError, PipelineError};

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 수집기 에러 (소켓 바인드, 수신 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (syslog_udp 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 세션 소스 호출 실패 (네트워크, 인증, 타임아웃)
    #[error("session source error: router '{router}': {reason}")]
    SessionSource {
        /// 대상 라우터 주소
        router: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 쓰기 실패
    #[error("store error: {path}: {reason}")]
    Store {
        /// 대상 파일/디렉토리 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for ConntrailError {
    fn from(err: IngestError) -> Self {
        ConntrailError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
