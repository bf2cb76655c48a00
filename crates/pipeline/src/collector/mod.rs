//! 메시지 수집 모듈 — 라우터가 보내는 원시 syslog 메시지를 수신합니다.
//!
//! # 수집 소스
//! - [`SyslogUdpCollector`]: UDP syslog 수신 (데이터그램 1개 = 메시지 1개)
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 해석한 [`RawMessage`]를
//! `tokio::mpsc::Sender<RawMessage>` 채널을 통해 파이프라인으로 전달합니다.
//!
//! 봉투(envelope) 해석은 최선 노력(best-effort)입니다: `<PRI>`와 BSD 타임스탬프가
//! 있으면 벗겨내고, `tag:` 형태의 분류 태그를 찾습니다. 어떤 입력에서도
//! 실패하지 않으며, 태그를 찾지 못하면 빈 태그로 전달합니다.

pub mod syslog_udp;

pub use syslog_udp::{SyslogUdpCollector, SyslogUdpConfig};

use std::time::SystemTime;

/// 수신한 원시 메시지
///
/// 수집기가 생성하고 파서가 소비하는 중간 데이터 형식입니다.
/// `{sourceAddress, classificationTag, rawText}` 튜플에 수신 시각을 더한 것입니다.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// 송신 라우터 주소 (UDP peer IP)
    pub source: String,
    /// 분류 태그 (예: `prerouting`). 찾지 못하면 빈 문자열.
    pub tag: String,
    /// 태그 이후의 메시지 본문
    pub text: String,
    /// 수신 시각
    pub received_at: SystemTime,
}

impl RawMessage {
    /// 새 RawMessage를 생성합니다.
    pub fn new(
        source: impl Into<String>,
        tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            tag: tag.into(),
            text: text.into(),
            received_at: SystemTime::now(),
        }
    }

    /// 수신한 데이터그램을 RawMessage로 해석합니다.
    pub fn from_datagram(data: &[u8], source: impl Into<String>) -> Self {
        let body = String::from_utf8_lossy(data);
        let body = strip_pri(body.trim());
        let body = strip_bsd_timestamp(body);
        let (tag, text) = split_tag(body);
        Self::new(source, tag, text)
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

/// `<PRI>` 접두사를 제거합니다.
///
/// PRI가 숫자가 아니거나 닫히지 않으면 입력을 그대로 돌려줍니다.
fn strip_pri(body: &str) -> &str {
    let Some(rest) = body.strip_prefix('<') else {
        return body;
    };
    match rest.split_once('>') {
        Some((pri, tail)) if !pri.is_empty() && pri.bytes().all(|b| b.is_ascii_digit()) => tail,
        _ => body,
    }
}

/// BSD syslog 타임스탬프(`MMM DD HH:MM:SS `)를 있으면 건너뜁니다.
fn strip_bsd_timestamp(body: &str) -> &str {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let trimmed = body.trim_start();
    let mut parts = trimmed.splitn(4, ' ').filter(|p| !p.is_empty());
    let (Some(month), Some(day), Some(time)) = (parts.next(), parts.next(), parts.next()) else {
        return trimmed;
    };
    let looks_like_timestamp = MONTHS.contains(&month)
        && day.bytes().all(|b| b.is_ascii_digit())
        && time.len() == 8
        && time.as_bytes()[2] == b':'
        && time.as_bytes()[5] == b':';
    if looks_like_timestamp {
        parts.next().unwrap_or("").trim_start()
    } else {
        trimmed
    }
}

/// 분류 태그와 본문을 분리합니다.
///
/// 첫 토큰이 `tag:` 형태면 그것이 태그입니다. 첫 토큰이 아니고 두 번째
/// 토큰이 `tag:` 형태면 첫 토큰을 호스트명으로 보고 건너뜁니다.
/// 둘 다 아니면 태그 없이 전체를 본문으로 취급합니다.
fn split_tag(body: &str) -> (String, String) {
    let trimmed = body.trim_start();

    for skip in 0..2 {
        let mut parts = trimmed.splitn(skip + 2, ' ');
        let mut candidate = "";
        for _ in 0..=skip {
            candidate = parts.next().unwrap_or("");
        }
        if let Some(tag) = candidate.strip_suffix(':')
            && !tag.is_empty()
        {
            let text = parts.next().unwrap_or("").trim_start();
            return (tag.to_owned(), text.to_owned());
        }
        // 첫 토큰이 호스트명일 수 있으므로 한 번 더 시도
    }

    (String::new(), trimmed.to_owned())
}
