//! 라우터별 통계 — 수신/저장 카운터와 최근 수신 시각
//!
//! [`StatsRegistry`]는 수집 파이프라인과 로그 저장소가 갱신하고
//! 외부 리포팅 협력자가 읽는 컨텍스트 객체입니다. 전역 싱글턴 대신
//! 각 컴포넌트 생성 시 명시적으로 전달됩니다.
//!
//! 카운터는 원자적 갱신만 필요하므로 `AtomicU64`를 사용하며,
//! 라우터 엔트리 추가에만 짧은 락을 잡습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// 단일 라우터의 통계
#[derive(Debug, Default)]
pub struct RouterStats {
    /// 수신한 메시지 수
    seen: AtomicU64,
    /// 저장에 성공한 이벤트 수
    persisted: AtomicU64,
    /// 마지막 수신 시각 (epoch millis)
    last_seen_ms: AtomicU64,
}

impl RouterStats {
    fn touch(&self) {
        self.last_seen_ms.store(now_millis(), Ordering::Relaxed);
    }
}

/// 외부 리포팅용 통계 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStatSnapshot {
    /// 라우터 주소
    pub router: String,
    /// 수신한 메시지 수
    pub seen: u64,
    /// 저장에 성공한 이벤트 수
    pub persisted: u64,
    /// 마지막 수신 시각 (epoch millis, 0이면 기록 없음)
    pub last_seen_ms: u64,
}

/// 라우터별 통계 테이블
///
/// clone해도 같은 테이블을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct StatsRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<RouterStats>>>>,
}

impl StatsRegistry {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 라우터의 엔트리를 얻거나 새로 만듭니다.
    fn entry(&self, router: &str) -> Arc<RouterStats> {
        // 흔한 경로는 읽기 락만으로 끝남
        if let Some(stats) = self
            .inner
            .read()
            .ok()
            .and_then(|map| map.get(router).cloned())
        {
            return stats;
        }
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(router.to_owned()).or_default().clone()
    }

    /// 메시지 수신을 기록합니다.
    pub fn record_seen(&self, router: &str) {
        let stats = self.entry(router);
        stats.seen.fetch_add(1, Ordering::Relaxed);
        stats.touch();
    }

    /// 저장 성공을 기록합니다.
    pub fn record_persisted(&self, router: &str) {
        let stats = self.entry(router);
        stats.persisted.fetch_add(1, Ordering::Relaxed);
        stats.touch();
    }

    /// 라우터 하나의 스냅샷을 반환합니다.
    pub fn snapshot_for(&self, router: &str) -> Option<RouterStatSnapshot> {
        let map = self.inner.read().ok()?;
        map.get(router).map(|stats| RouterStatSnapshot {
            router: router.to_owned(),
            seen: stats.seen.load(Ordering::Relaxed),
            persisted: stats.persisted.load(Ordering::Relaxed),
            last_seen_ms: stats.last_seen_ms.load(Ordering::Relaxed),
        })
    }

    /// 전체 라우터의 스냅샷을 라우터 주소 순으로 반환합니다.
    pub fn snapshot(&self) -> Vec<RouterStatSnapshot> {
        let map = match self.inner.read() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut rows: Vec<RouterStatSnapshot> = map
            .iter()
            .map(|(router, stats)| RouterStatSnapshot {
                router: router.clone(),
                seen: stats.seen.load(Ordering::Relaxed),
                persisted: stats.persisted.load(Ordering::Relaxed),
                last_seen_ms: stats.last_seen_ms.load(Ordering::Relaxed),
            })
            .collect();
        rows.sort_by(|a, b| a.router.cmp(&b.router));
        rows
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
