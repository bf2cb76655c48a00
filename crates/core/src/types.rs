//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 커넥션 추적 이벤트와 그 구성 요소를 정의합니다.
//! 라우터가 보낸 텍스트는 검증 없이 그대로 보존합니다 (벤더 출력 무검증 정책).

use std::fmt;

use serde::{Deserialize, Serialize};

/// 직렬화 라인의 고정 컬럼 수
///
/// time, router, subscriber, protocol, mac,
/// local ip/port, remote ip/port, NAT ip/port 순서입니다.
pub const LOG_COLUMN_COUNT: usize = 11;

/// 미해석 식별자의 직렬화 표기
pub const UNRESOLVED_SENTINEL: &str = "unknown";

/// 가입자 식별자
///
/// 메시지에 내장되어 있거나 Identity Resolver가 채워 넣습니다.
/// 어느 쪽에서도 결정하지 못하면 [`SubscriberId::Unresolved`]로 남습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriberId {
    /// 해석된 가입자 id
    Resolved(String),
    /// 현재 알 수 없음 — 직렬화 시 `unknown`으로 표기
    Unresolved,
}

impl SubscriberId {
    /// 비어 있지 않은 문자열이면 Resolved, 아니면 Unresolved를 생성합니다.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Unresolved
        } else {
            Self::Resolved(raw.to_owned())
        }
    }

    /// 해석 여부를 반환합니다.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(id) => write!(f, "{id}"),
            Self::Unresolved => write!(f, "{UNRESOLVED_SENTINEL}"),
        }
    }
}

/// 네트워크 엔드포인트 (`ip:port`)
///
/// 라우터가 보낸 텍스트를 첫 번째 콜론에서 자른 결과를 그대로 담습니다.
/// ip, port 모두 검증하지 않은 문자열입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// IP 부분 (무검증)
    pub ip: String,
    /// 포트 부분 (무검증 숫자 문자열)
    pub port: String,
}

impl Endpoint {
    /// `ip:port` 문자열을 첫 번째 콜론에서 분리합니다.
    ///
    /// 콜론이 없으면 전체가 ip, port는 빈 문자열이 됩니다.
    pub fn from_pair(pair: &str) -> Self {
        match pair.split_once(':') {
            Some((ip, port)) => Self {
                ip: ip.to_owned(),
                port: port.to_owned(),
            },
            None => Self {
                ip: pair.to_owned(),
                port: String::new(),
            },
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// 커넥션 추적 이벤트
///
/// 파서가 원시 메시지에서 추출한 하나의 네트워크 흐름 기록입니다.
/// 생성 후 변경하지 않으며, 직렬화될 때까지만 메모리에 존재합니다.
/// 중복 이벤트는 허용됩니다 (dedup 없음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// 처리 시각 (`YYYY-MM-DD HH:MM:SS`, 설정된 오프셋 기준)
    pub time: String,
    /// 라우터 장비 주소
    pub router: String,
    /// 가입자 식별자
    pub subscriber: SubscriberId,
    /// 프로토콜 토큰 (예: `tcp`)
    pub protocol: String,
    /// 출발지 MAC 주소
    pub mac: String,
    /// 로컬 엔드포인트
    pub local: Endpoint,
    /// 원격 엔드포인트
    pub remote: Endpoint,
    /// NAT 변환 후 엔드포인트
    pub nat: Endpoint,
}

impl ConnectionEvent {
    /// 고정 컬럼 순서의 CSV 한 줄로 직렬화합니다 (개행 포함).
    ///
    /// protocol만 큰따옴표로 감싸며, 그 외 이스케이프는 없습니다.
    /// protocol 값에 큰따옴표나 콤마가 올 수 없다는 것은 포맷의 수용된 제약입니다.
    pub fn to_log_line(&self) -> String {
        format!(
            "{},{},{},\"{}\",{},{},{},{},{},{},{}\n",
            self.time,
            self.router,
            self.subscriber,
            self.protocol,
            self.mac,
            self.local.ip,
            self.local.port,
            self.remote.ip,
            self.remote.port,
            self.nat.ip,
            self.nat.port,
        )
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} {}->{} nat={}",
            self.time, self.router, self.subscriber, self.protocol, self.local, self.remote, self.nat,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ConnectionEvent {
        ConnectionEvent {
            time: "2025-01-15 12:00:00".to_owned(),
            router: "10.0.0.1".to_owned(),
            subscriber: SubscriberId::Resolved("bob".to_owned()),
            protocol: "tcp".to_owned(),
            mac: "AA:BB:CC:DD:EE:FF".to_owned(),
            local: Endpoint::from_pair("10.0.0.5:1234"),
            remote: Endpoint::from_pair("93.1.1.1:80"),
            nat: Endpoint::from_pair("203.0.113.9:40000"),
        }
    }

    #[test]
    fn endpoint_splits_on_first_colon() {
        let ep = Endpoint::from_pair("10.0.0.5:1234");
        assert_eq!(ep.ip, "10.0.0.5");
        assert_eq!(ep.port, "1234");
    }

    #[test]
    fn endpoint_without_colon_keeps_whole_as_ip() {
        let ep = Endpoint::from_pair("10.0.0.5");
        assert_eq!(ep.ip, "10.0.0.5");
        assert_eq!(ep.port, "");
    }

    #[test]
    fn endpoint_empty_input() {
        let ep = Endpoint::from_pair("");
        assert_eq!(ep.ip, "");
        assert_eq!(ep.port, "");
    }

    #[test]
    fn subscriber_from_raw() {
        assert_eq!(
            SubscriberId::from_raw("alice"),
            SubscriberId::Resolved("alice".to_owned())
        );
        assert_eq!(SubscriberId::from_raw(""), SubscriberId::Unresolved);
    }

    #[test]
    fn unresolved_renders_sentinel() {
        assert_eq!(SubscriberId::Unresolved.to_string(), "unknown");
        assert!(!SubscriberId::Unresolved.is_resolved());
    }

    #[test]
    fn log_line_column_order() {
        let line = sample_event().to_log_line();
        assert_eq!(
            line,
            "2025-01-15 12:00:00,10.0.0.1,bob,\"tcp\",AA:BB:CC:DD:EE:FF,10.0.0.5,1234,93.1.1.1,80,203.0.113.9,40000\n"
        );
    }

    #[test]
    fn log_line_round_trip() {
        // 직렬화 후 문서화된 컬럼 순서로 재분리하면 모든 필드가 복원되어야 함
        let event = sample_event();
        let line = event.to_log_line();
        let cols: Vec<&str> = line.trim_end().split(',').collect();
        assert_eq!(cols.len(), LOG_COLUMN_COUNT);
        assert_eq!(cols[0], event.time);
        assert_eq!(cols[1], event.router);
        assert_eq!(cols[2], "bob");
        assert_eq!(cols[3].trim_matches('"'), event.protocol);
        assert_eq!(cols[4], event.mac);
        assert_eq!(cols[5], event.local.ip);
        assert_eq!(cols[6], event.local.port);
        assert_eq!(cols[7], event.remote.ip);
        assert_eq!(cols[8], event.remote.port);
        assert_eq!(cols[9], event.nat.ip);
        assert_eq!(cols[10], event.nat.port);
    }

    #[test]
    fn log_line_unresolved_subscriber() {
        let event = ConnectionEvent {
            subscriber: SubscriberId::Unresolved,
            ..sample_event()
        };
        let line = event.to_log_line();
        let cols: Vec<&str> = line.trim_end().split(',').collect();
        assert_eq!(cols[2], "unknown");
    }

    #[test]
    fn event_serialize_deserialize() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        let back: ConnectionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn event_display_contains_flow() {
        let display = sample_event().to_string();
        assert!(display.contains("10.0.0.5:1234"));
        assert!(display.contains("93.1.1.1:80"));
        assert!(display.contains("bob"));
    }
}
