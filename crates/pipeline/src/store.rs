//! 파티션 로그 저장소
//!
//! (라우터 주소, 시간 버킷)으로 파티션된 append-only 저장소입니다.
//! 파티션 파일은 `<base>/<router>/<DD-MM-YY> <H>-00 <AM|PM>.log`이며,
//! 버킷은 쓰기 시점의 벽시계(설정 오프셋 기준) 기준입니다 — 이벤트에
//! 기록된 시각이 아닙니다.
//!
//! append는 호출마다 독립적입니다: 핸들을 유지하지 않고, `O_APPEND`
//! 핸들에 한 줄 전체를 단일 `write_all`로 씁니다. 같은 파티션에 대한
//! 프로세스 내 동시 쓰기에서도 줄이 끼어들지 않습니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use conntrail_core::stats::StatsRegistry;
use conntrail_core::types::ConnectionEvent;

use crate::error::IngestError;

/// 저장소 파티션 하나 (라우터 디렉토리 안의 시간 버킷 파일)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// 라우터 주소 (디렉토리 이름)
    pub router: String,
    /// 버킷 파일 이름
    pub file_name: String,
    /// 전체 경로
    pub path: PathBuf,
}

/// 파티션 로그 저장소
#[derive(Debug, Clone)]
pub struct LogStore {
    base_dir: PathBuf,
    offset: FixedOffset,
    stats: StatsRegistry,
}

impl LogStore {
    /// 새 저장소를 생성합니다. 디렉토리는 첫 append 때 만들어집니다.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        utc_offset_hours: i32,
        stats: StatsRegistry,
    ) -> Result<Self, IngestError> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| IngestError::Config {
                field: "utc_offset_hours".to_owned(),
                reason: "must be within -14..=14".to_owned(),
            })?;
        Ok(Self {
            base_dir: base_dir.into(),
            offset,
            stats,
        })
    }

    /// 저장소 루트 디렉토리를 반환합니다.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 이벤트를 현재 시간 버킷 파티션에 추가합니다.
    ///
    /// 성공 시 해당 라우터의 persisted 카운터를 증가시킵니다.
    pub async fn append(&self, event: &ConnectionEvent) -> Result<(), IngestError> {
        self.append_at(event, Utc::now()).await
    }

    /// 쓰기 시점을 지정하여 추가합니다. 테스트에서 버킷을 고정할 때 씁니다.
    pub async fn append_at(
        &self,
        event: &ConnectionEvent,
        now: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        let router_dir = self.base_dir.join(&event.router);
        tokio::fs::create_dir_all(&router_dir)
            .await
            .map_err(|e| store_err(&router_dir, format!("create dir: {e}")))?;

        let path = router_dir.join(partition_file_name(now.with_timezone(&self.offset)));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| store_err(&path, format!("open: {e}")))?;

        // 한 줄 전체를 단일 write — O_APPEND이므로 줄 단위 원자성 보장
        file.write_all(event.to_log_line().as_bytes())
            .await
            .map_err(|e| store_err(&path, format!("write: {e}")))?;

        self.stats.record_persisted(&event.router);
        Ok(())
    }

    /// 범위 내 파티션 목록을 반환합니다.
    ///
    /// `router`가 `Some`이면 그 라우터의 파티션만, `None`이면 전체를
    /// 라우터 → 파일명 순으로 반환합니다. 존재하지 않는 라우터는 빈 목록입니다.
    pub async fn list_partitions(
        &self,
        router: Option<&str>,
    ) -> Result<Vec<Partition>, IngestError> {
        let mut partitions = Vec::new();
        match router {
            Some(router) => {
                self.collect_router_partitions(router, &mut partitions).await;
            }
            None => {
                let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
                    Ok(entries) => entries,
                    // 저장소가 아직 만들어지지 않음
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(partitions),
                    Err(e) => return Err(store_err(&self.base_dir, format!("read dir: {e}"))),
                };
                let mut routers = Vec::new();
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                        routers.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                routers.sort();
                for router in routers {
                    self.collect_router_partitions(&router, &mut partitions).await;
                }
            }
        }
        Ok(partitions)
    }

    async fn collect_router_partitions(&self, router: &str, out: &mut Vec<Partition>) {
        let dir = self.base_dir.join(router);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        out.extend(files.into_iter().map(|file_name| Partition {
            router: router.to_owned(),
            path: dir.join(&file_name),
            file_name,
        }));
    }

    /// 파티션의 전체 줄을 읽습니다.
    ///
    /// 읽기 실패는 그 파티션만 빈 목록으로 격하시킵니다 (검색 스캔이
    /// 파일 하나 때문에 통째로 실패하지 않도록).
    pub async fn read_all(&self, partition: &Partition) -> Vec<String> {
        match tokio::fs::read_to_string(&partition.path).await {
            Ok(content) => content.lines().map(str::to_owned).collect(),
            Err(e) => {
                warn!(path = %partition.path.display(), error = %e, "partition read failed");
                Vec::new()
            }
        }
    }
}

fn store_err(path: &Path, reason: String) -> IngestError {
    IngestError::Store {
        path: path.display().to_string(),
        reason,
    }
}

/// 시간 버킷 파일 이름을 렌더링합니다.
///
/// `DD-MM-YY H-00 AM|PM.log` — 12시간제 시는 패딩하지 않습니다 (1~12).
pub fn partition_file_name(local: DateTime<FixedOffset>) -> String {
    let (is_pm, hour) = local.hour12();
    let period = if is_pm { "PM" } else { "AM" };
    format!("{} {hour}-00 {period}.log", local.format("%d-%m-%y"))
}
