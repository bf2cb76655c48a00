//! conntrail-daemon 진입점
//!
//! 설정과 라우터 레지스트리를 로드하고 수집 파이프라인을 시작한 뒤
//! 종료 시그널까지 대기합니다.

mod cli;
mod logging;
mod report;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use conntrail_core::config::ConntrailConfig;
use conntrail_core::pipeline::Pipeline;
use conntrail_core::registry::RouterRegistry;
use conntrail_core::stats::StatsRegistry;
use conntrail_pipeline::{IngestPipelineBuilder, PipelineConfig};

use crate::cli::DaemonCli;

/// 통계 리포트 간격
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let config = ConntrailConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let registry_path = cli
        .registry
        .unwrap_or_else(|| PathBuf::from(&config.resolver.registry_path));
    let registry = RouterRegistry::load(&registry_path)
        .await
        .with_context(|| format!("failed to load registry from {}", registry_path.display()))?;

    if cli.validate {
        println!(
            "configuration OK: {} ({} routers)",
            cli.config.display(),
            registry.len()
        );
        return Ok(());
    }

    // CLI 오버라이드가 환경변수와 설정 파일보다 우선
    logging::init_tracing(
        &config.general,
        cli.log_level.as_deref(),
        cli.log_format.as_deref(),
    )?;
    tracing::info!("conntrail-daemon starting");
    tracing::info!(
        routers = registry.len(),
        polled = registry.with_session_source().count(),
        registry = %registry_path.display(),
        "router registry loaded"
    );

    // 파이프라인 빌드 및 시작
    let stats = StatsRegistry::new();
    let mut pipeline = IngestPipelineBuilder::new()
        .config(PipelineConfig::from_core(&config))
        .registry(registry)
        .stats(stats.clone())
        .build()
        .context("failed to build ingest pipeline")?;

    if config.ingest.enabled {
        pipeline
            .start()
            .await
            .context("failed to start ingest pipeline")?;
        tracing::info!(bind_addr = ?pipeline.bound_addr(), "ingest pipeline started");
    } else {
        tracing::warn!("ingest disabled by configuration, search data will not grow");
    }

    let cancel = CancellationToken::new();
    let reporter = report::spawn_stats_reporter(stats, STATS_REPORT_INTERVAL, cancel.child_token());

    // 종료 시그널 대기
    tracing::info!("conntrail-daemon running");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    // 우아한 종료
    cancel.cancel();
    let _ = reporter.await;
    if config.ingest.enabled
        && let Err(e) = pipeline.stop().await
    {
        tracing::error!(error = %e, "failed to stop ingest pipeline");
    }

    tracing::info!("conntrail-daemon shut down");
    Ok(())
}
