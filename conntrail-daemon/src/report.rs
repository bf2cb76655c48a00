//! 주기 통계 리포터
//!
//! 라우터별 수신/저장 카운터와 마지막 수신 시각 스냅샷을 일정 간격으로
//! 구조화 로그에 기록합니다. 수집 경로와는 [`StatsRegistry`]로만
//! 연결되는 읽기 전용 협력자입니다.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use conntrail_core::stats::StatsRegistry;

/// 통계 리포터 태스크를 시작합니다.
pub fn spawn_stats_reporter(
    stats: StatsRegistry,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 시작 직후의 빈 스냅샷은 생략
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => report(&stats),
            }
        }
    })
}

fn report(stats: &StatsRegistry) {
    let rows = stats.snapshot();
    let (seen, persisted) = rows
        .iter()
        .fold((0u64, 0u64), |(s, p), row| (s + row.seen, p + row.persisted));

    info!(routers = rows.len(), seen, persisted, "ingest totals");
    for row in rows {
        info!(
            router = %row.router,
            seen = row.seen,
            persisted = row.persisted,
            last_seen_ms = row.last_seen_ms,
            "router stats"
        );
    }
}
