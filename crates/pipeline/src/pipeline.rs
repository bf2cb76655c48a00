//! 파이프라인 오케스트레이션 — 수집/파싱/해석/저장의 전체 흐름을 관리합니다.
//!
//! [`IngestPipeline`]은 core의 [`Pipeline`](conntrail_core::pipeline::Pipeline)
//! trait을 구현하여 `conntrail-daemon`에서 start/stop/health_check
//! 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! SyslogUdpCollector -> mpsc -> [parse -> resolve -> append] loop
//!                               + periodic session refresh task
//! ```
//!
//! 단계 사이의 배압은 mpsc 채널 용량이 제공합니다. 저장 실패는 해당
//! 이벤트를 버리고 계속합니다 (재시도/버퍼링 없음).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use conntrail_core::error::{ConntrailError, PipelineError};
use conntrail_core::pipeline::{HealthStatus, Pipeline};
use conntrail_core::registry::RouterRegistry;
use conntrail_core::stats::StatsRegistry;

use crate::collector::{RawMessage, SyslogUdpCollector, SyslogUdpConfig};
use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::parser::ConntrackParser;
use crate::resolver::{IdentityResolver, RouterOsClient, SessionSource};
use crate::search::SearchEngine;
use crate::store::LogStore;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use conntrail_pipeline::{IngestPipelineBuilder, PipelineConfig};
///
/// let mut pipeline = IngestPipelineBuilder::new()
///     .config(config)
///     .registry(registry)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct IngestPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 메시지 파서
    parser: ConntrackParser,
    /// 식별자 해석기
    resolver: IdentityResolver,
    /// 로그 저장소
    store: LogStore,
    /// 라우터별 통계
    stats: StatsRegistry,
    /// 내부 RawMessage 채널 수신측 (start에서 처리 루프로 이동)
    raw_rx: Option<mpsc::Receiver<RawMessage>>,
    /// 내부 RawMessage 채널 송신측 (수집기에 전달)
    raw_tx: mpsc::Sender<RawMessage>,
    /// 종료 신호
    cancel: CancellationToken,
    /// 백그라운드 태스크 핸들
    tasks: Vec<tokio::task::JoinHandle<()>>,
    /// 수집기가 실제로 바인드한 주소 (start 이후)
    bound_addr: Option<SocketAddr>,
}

impl IngestPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 수집기가 바인드한 실제 주소를 반환합니다 (start 이후에만 Some).
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.bound_addr
    }

    /// RawMessage 주입용 송신측을 반환합니다.
    ///
    /// UDP를 거치지 않고 메시지를 밀어 넣을 때 씁니다 (테스트, 대체 수집 소스).
    pub fn raw_message_sender(&self) -> mpsc::Sender<RawMessage> {
        self.raw_tx.clone()
    }

    /// 통계 테이블을 반환합니다 (clone해도 같은 테이블 공유).
    pub fn stats(&self) -> StatsRegistry {
        self.stats.clone()
    }

    /// 저장소 레이아웃 위의 검색 엔진을 만듭니다.
    pub fn search_engine(&self) -> SearchEngine {
        SearchEngine::new(self.store.clone())
    }

    /// 식별자 해석기를 반환합니다 (clone해도 같은 캐시 공유).
    pub fn resolver(&self) -> IdentityResolver {
        self.resolver.clone()
    }
}

/// 처리 루프: 수신 → 파싱 → 식별자 해석 → 저장
async fn process_loop(
    mut raw_rx: mpsc::Receiver<RawMessage>,
    parser: ConntrackParser,
    resolver: IdentityResolver,
    store: LogStore,
    stats: StatsRegistry,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = raw_rx.recv() => match raw {
                Some(raw) => raw,
                None => break, // 모든 수집기가 종료됨
            },
        };

        stats.record_seen(&raw.source);

        let Some(mut event) = parser.parse(&raw) else {
            debug!(source = %raw.source, tag = %raw.tag, "not a conntrack event");
            continue;
        };

        // 메시지에 가입자 id가 없으면 세션 캐시에서 해석 시도
        if !event.subscriber.is_resolved() {
            event.subscriber = resolver.lookup(&event.router, &event.local.ip);
        }

        if let Err(e) = store.append(&event).await {
            // 실패한 이벤트는 버림 — 재시도 없음
            warn!(router = %event.router, error = %e, "append failed, event dropped");
        }
    }
    info!("ingest processing loop stopped");
}

impl Pipeline for IngestPipeline {
    async fn start(&mut self) -> Result<(), ConntrailError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting ingest pipeline");

        // 1. 수집기 바인드 — 실패는 시작 에러
        let collector_config = SyslogUdpConfig {
            bind_addr: self.config.syslog_bind.clone(),
            max_message_size: self.config.max_message_size,
        };
        let mut collector = SyslogUdpCollector::new(
            collector_config,
            self.raw_tx.clone(),
            self.cancel.child_token(),
        );
        self.bound_addr = Some(collector.bind().await.map_err(ConntrailError::from)?);

        // 2. 수집기 태스크
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = collector.run().await {
                error!(error = %e, "syslog udp collector terminated");
            }
        }));

        // 3. 처리 루프 태스크
        let raw_rx = self
            .raw_rx
            .take()
            .ok_or_else(|| PipelineError::InitFailed("raw channel already taken".to_owned()))?;
        self.tasks.push(tokio::spawn(process_loop(
            raw_rx,
            self.parser.clone(),
            self.resolver.clone(),
            self.store.clone(),
            self.stats.clone(),
            self.cancel.child_token(),
        )));

        // 4. 주기 세션 갱신 태스크
        self.tasks.push(self.resolver.spawn_periodic(
            Duration::from_secs(self.config.refresh_interval_secs),
            self.cancel.child_token(),
        ));

        self.state = PipelineState::Running;
        info!(bind_addr = ?self.bound_addr, "ingest pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ConntrailError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping ingest pipeline");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                warn!(error = %e, "pipeline task join failed");
            }
        }

        self.state = PipelineState::Stopped;
        info!("ingest pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.raw_tx.capacity() == 0 {
                    HealthStatus::Degraded("ingest channel full".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집 파이프라인 빌더
///
/// 설정을 검증하고 채널/구성 요소를 생성합니다.
pub struct IngestPipelineBuilder {
    config: PipelineConfig,
    registry: RouterRegistry,
    session_source: Option<Arc<dyn SessionSource>>,
    stats: Option<StatsRegistry>,
}

impl IngestPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            registry: RouterRegistry::default(),
            session_source: None,
            stats: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 라우터 레지스트리를 지정합니다.
    pub fn registry(mut self, registry: RouterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 세션 소스를 교체합니다. 기본은 [`RouterOsClient`]입니다.
    pub fn session_source(mut self, source: Arc<dyn SessionSource>) -> Self {
        self.session_source = Some(source);
        self
    }

    /// 외부 통계 테이블을 공유합니다. 지정하지 않으면 새로 만듭니다.
    pub fn stats(mut self, stats: StatsRegistry) -> Self {
        self.stats = Some(stats);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<IngestPipeline, IngestError> {
        self.config.validate()?;

        let stats = self.stats.unwrap_or_default();
        let parser = ConntrackParser::new(self.config.utc_offset_hours)?;
        let store = LogStore::new(
            self.config.base_dir.clone(),
            self.config.utc_offset_hours,
            stats.clone(),
        )?;
        let source = self
            .session_source
            .unwrap_or_else(|| Arc::new(RouterOsClient::new()));
        let resolver = IdentityResolver::new(
            &self.registry,
            source,
            Duration::from_secs(self.config.fetch_timeout_secs),
        );

        let (raw_tx, raw_rx) = mpsc::channel(self.config.channel_capacity);

        Ok(IngestPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            parser,
            resolver,
            store,
            stats,
            raw_rx: Some(raw_rx),
            raw_tx,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            bound_addr: None,
        })
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
