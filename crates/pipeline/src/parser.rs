//! 커넥션 추적 메시지 파서
//!
//! `prerouting` 태그가 붙은 메시지만 이벤트로 취급하며, 그 외 태그는
//! "이벤트 없음"(`None`)입니다 — 에러도, 실패 로그도 아닙니다.
//!
//! 필드 추출은 선언적 구분자 절단([`cut`])의 순서 있는 적용입니다.
//! 어떤 입력에서도 패닉하거나 에러를 반환하지 않으며, 구분자 쌍을 찾지
//! 못한 필드는 빈 문자열이 됩니다. 라우터가 보낸 텍스트는 검증 없이
//! 그대로 보존합니다.

use chrono::{DateTime, FixedOffset, Utc};

use conntrail_core::types::{ConnectionEvent, Endpoint, SubscriberId};

use crate::collector::RawMessage;
use crate::error::IngestError;

/// 커넥션 추적 메시지의 분류 태그
pub const CONNTRACK_TAG: &str = "prerouting";

/// 구분자 쌍 사이의 텍스트를 잘라냅니다.
///
/// `start` 마커 이후부터 `end` 마커 이전까지를 반환합니다.
/// content/start/end가 비어 있거나 마커 쌍이 완전히 매칭되지 않으면
/// 빈 문자열을 반환합니다. 절대 패닉하지 않습니다.
pub fn cut<'a>(content: &'a str, start: &str, end: &str) -> &'a str {
    if content.is_empty() || start.is_empty() || end.is_empty() {
        return "";
    }
    let Some(after) = content.split_once(start).map(|(_, rest)| rest) else {
        return "";
    };
    after.split_once(end).map(|(inner, _)| inner).unwrap_or("")
}

/// 커넥션 추적 메시지 파서
///
/// 설정된 UTC 오프셋으로 처리 시각을 이동시켜 타임스탬프를 렌더링합니다.
/// 메시지에 내장된 시각은 사용하지 않습니다.
#[derive(Debug, Clone)]
pub struct ConntrackParser {
    /// 타임스탬프 렌더링용 고정 오프셋
    offset: FixedOffset,
}

impl ConntrackParser {
    /// 새 파서를 생성합니다.
    ///
    /// `utc_offset_hours`가 ±14시간을 벗어나면 설정 에러를 반환합니다.
    pub fn new(utc_offset_hours: i32) -> Result<Self, IngestError> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| IngestError::Config {
                field: "utc_offset_hours".to_owned(),
                reason: "must be within -14..=14".to_owned(),
            })?;
        Ok(Self { offset })
    }

    /// 파서의 고정 오프셋을 반환합니다.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// 원시 메시지를 커넥션 이벤트로 파싱합니다.
    ///
    /// 처리 시각은 호출 시점입니다. 커넥션 추적 태그가 아니면 `None`.
    pub fn parse(&self, raw: &RawMessage) -> Option<ConnectionEvent> {
        self.parse_at(raw, Utc::now())
    }

    /// 처리 시각을 지정하여 파싱합니다. 테스트에서 시각을 고정할 때 씁니다.
    pub fn parse_at(&self, raw: &RawMessage, instant: DateTime<Utc>) -> Option<ConnectionEvent> {
        if raw.tag != CONNTRACK_TAG {
            return None;
        }
        let text = raw.text.as_str();

        // 내장 가입자 id는 없어도 됨 — Unresolved로 두고 resolver가 채움
        let subscriber = SubscriberId::from_raw(cut(text, "in:<", ">"));

        let protocol = cut(text, "proto ", ", ");
        let tuple_prefix = format!("{protocol}, ");
        let tuple = cut(text, &tuple_prefix, ", len");
        let (local, remote) = match tuple.split_once("->") {
            Some((local, remote)) => (local, remote),
            None => (tuple, ""),
        };

        // NAT 구간에서는 변환 후(post-NAT) 절반만 보존
        let nat_raw = cut(text, "NAT (", ")");
        let nat = nat_raw
            .split_once("->")
            .map(|(_, post)| post)
            .unwrap_or("");

        let mac = cut(text, "src-mac ", ", ");

        Some(ConnectionEvent {
            time: self.render_time(instant),
            router: raw.source.clone(),
            subscriber,
            protocol: protocol.to_owned(),
            mac: mac.to_owned(),
            local: Endpoint::from_pair(local),
            remote: Endpoint::from_pair(remote),
            nat: Endpoint::from_pair(nat),
        })
    }

    /// 처리 시각을 오프셋 이동 후 `YYYY-MM-DD HH:MM:SS`로 렌더링합니다.
    pub fn render_time(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}
