//! 가입자 식별자 해석 모듈
//!
//! 세션 소스가 설정된 라우터마다 로컬 IP → 가입자 id 매핑을 유지하고
//! 조회에 제공합니다. 매핑은 주기 타이머와 조회 미스에 의해 갱신되며,
//! 라우터당 동시 갱신은 최대 1건입니다.
//!
//! # 설계 불변식
//! - [`IdentityResolver::lookup`]은 절대 I/O를 기다리지 않습니다.
//!   미스는 즉시 Unresolved를 반환하고 백그라운드 갱신을 예약할 뿐입니다.
//! - 갱신 성공 시 세션 맵은 통째로 교체됩니다 (부분 병합 없음).
//! - 갱신 실패 시 기존 맵을 유지합니다 — 오래된 데이터가 없는 것보다 낫습니다.
//! - 라우터별 실패는 격리됩니다. 한 장비의 장애가 다른 장비의 갱신을
//!   지연시키지 않습니다.

pub mod routeros;

pub use routeros::RouterOsClient;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conntrail_core::registry::{RouterDevice, RouterRegistry};
use conntrail_core::types::SubscriberId;

use crate::error::IngestError;

/// 활성 세션 목록 소스
///
/// 라우터의 관리 인터페이스에서 현재 활성 세션 전체를
/// 로컬 IP → 가입자 id 맵으로 가져옵니다.
/// 프로덕션 구현은 [`RouterOsClient`]이며, 테스트에서는 mock으로 대체합니다.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// 장비의 활성 세션 전체를 조회합니다.
    async fn active_sessions(
        &self,
        device: &RouterDevice,
    ) -> Result<HashMap<String, String>, IngestError>;
}

/// 라우터 하나의 캐시 상태
///
/// `refreshing` 플래그가 Idle(false) ↔ Refreshing(true) 상태 기계입니다.
struct RouterSlot {
    /// 장비 정보 (세션 소스 설정 포함)
    device: RouterDevice,
    /// 현재 세션 맵. 갱신 시 Arc 전체가 교체됩니다.
    sessions: RwLock<Arc<HashMap<String, String>>>,
    /// 갱신 진행 중 여부. CAS로 최대 1건을 보장합니다.
    refreshing: AtomicBool,
}

struct ResolverInner {
    /// 세션 소스가 설정된 라우터만 포함 (장비 주소 → 슬롯)
    slots: HashMap<String, Arc<RouterSlot>>,
    source: Arc<dyn SessionSource>,
    fetch_timeout: Duration,
}

/// 가입자 식별자 해석기
///
/// clone이 저렴하며 (내부 Arc 공유) 파이프라인과 주기 갱신 태스크가
/// 같은 캐시를 공유합니다.
#[derive(Clone)]
pub struct IdentityResolver {
    inner: Arc<ResolverInner>,
}

impl IdentityResolver {
    /// 레지스트리에서 해석기를 생성합니다.
    ///
    /// 세션 소스가 설정되지 않은 장비는 조회 대상에서 제외되며,
    /// 해당 라우터의 조회는 항상 Unresolved를 반환합니다.
    pub fn new(
        registry: &RouterRegistry,
        source: Arc<dyn SessionSource>,
        fetch_timeout: Duration,
    ) -> Self {
        let slots = registry
            .with_session_source()
            .map(|device| {
                let slot = RouterSlot {
                    device: device.clone(),
                    sessions: RwLock::new(Arc::new(HashMap::new())),
                    refreshing: AtomicBool::new(false),
                };
                (device.address.clone(), Arc::new(slot))
            })
            .collect();
        Self {
            inner: Arc::new(ResolverInner {
                slots,
                source,
                fetch_timeout,
            }),
        }
    }

    /// 라우터의 로컬 IP에서 가입자 id를 조회합니다.
    ///
    /// I/O를 기다리지 않습니다. 캐시 미스이면 Unresolved를 즉시 반환하고,
    /// 해당 라우터가 Idle 상태라면 백그라운드 갱신을 시작합니다.
    /// tokio 런타임 컨텍스트에서 호출해야 합니다.
    pub fn lookup(&self, router: &str, ip: &str) -> SubscriberId {
        let Some(slot) = self.inner.slots.get(router) else {
            // 세션 소스 미설정 라우터 — 부수 효과 없음
            return SubscriberId::Unresolved;
        };

        let sessions = read_sessions(slot);
        if let Some(id) = sessions.get(ip) {
            return SubscriberId::Resolved(id.clone());
        }

        debug!(router, ip, "session cache miss");
        self.trigger_refresh(router);
        SubscriberId::Unresolved
    }

    /// 라우터의 갱신을 시작합니다. 이미 Refreshing이면 no-op입니다.
    pub fn trigger_refresh(&self, router: &str) {
        let Some(slot) = self.inner.slots.get(router) else {
            return;
        };
        // Idle → Refreshing 전이에 성공한 호출자만 갱신을 소유함
        if slot
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let slot = Arc::clone(slot);
        tokio::spawn(async move {
            refresh_slot(&inner, &slot).await;
        });
    }

    /// 라우터의 갱신을 동기적으로 수행하고 완료까지 기다립니다.
    ///
    /// 주기 갱신 루프와 테스트에서 사용합니다. 이미 Refreshing이면 no-op입니다.
    pub async fn refresh_now(&self, router: &str) {
        let Some(slot) = self.inner.slots.get(router) else {
            return;
        };
        if slot
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        refresh_slot(&self.inner, slot).await;
    }

    /// 주기 갱신 태스크를 시작합니다.
    ///
    /// 매 `interval`마다 모든 라우터의 갱신을 트리거합니다. 각 갱신은
    /// 독립 태스크로 실행되므로 한 장비의 지연이 다른 장비를 막지 않습니다.
    pub fn spawn_periodic(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let resolver = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 첫 tick은 즉시 발화하므로 시작 직후 한 번 채워짐
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("periodic session refresh stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        for router in resolver.inner.slots.keys() {
                            resolver.trigger_refresh(router);
                        }
                    }
                }
            }
        })
    }

    /// 세션 소스가 설정된 라우터 수를 반환합니다.
    pub fn router_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// 라우터의 현재 캐시된 세션 수를 반환합니다. 미등록 라우터는 0.
    pub fn cached_sessions(&self, router: &str) -> usize {
        self.inner
            .slots
            .get(router)
            .map(|slot| read_sessions(slot).len())
            .unwrap_or(0)
    }
}

fn read_sessions(slot: &RouterSlot) -> Arc<HashMap<String, String>> {
    let guard = slot
        .sessions
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard)
}

/// 슬롯 하나를 갱신합니다. 호출자가 Refreshing 전이를 이미 소유한 상태여야 합니다.
async fn refresh_slot(inner: &ResolverInner, slot: &RouterSlot) {
    let router = slot.device.address.clone();
    let result = tokio::time::timeout(
        inner.fetch_timeout,
        inner.source.active_sessions(&slot.device),
    )
    .await;

    match result {
        Ok(Ok(sessions)) => {
            let count = sessions.len();
            let mut guard = slot
                .sessions
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::new(sessions);
            drop(guard);
            info!(router = %router, sessions = count, "session map refreshed");
        }
        Ok(Err(e)) => {
            // 기존 맵 유지 — 오래된 매핑이 빈 매핑보다 낫다
            warn!(router = %router, error = %e, "session refresh failed, keeping stale map");
        }
        Err(_) => {
            warn!(
                router = %router,
                timeout_secs = inner.fetch_timeout.as_secs(),
                "session refresh timed out, keeping stale map"
            );
        }
    }

    slot.refreshing.store(false, Ordering::Release);
}
