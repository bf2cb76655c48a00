//! 스캔 기반 검색 엔진
//!
//! 저장소 파티션을 호출마다 전부 스캔합니다 (인덱스 없음 — 예상 볼륨에서
//! 수용 가능). 두 가지 질의 형태를 제공합니다:
//!
//! - 부분 문자열 검색: 원시 줄에 대한 대소문자 구분 `contains`
//! - 구조화 필터 검색: 줄을 고정 컬럼으로 재분해한 뒤 시간 범위(포함) +
//!   컬럼별 대소문자 무시 부분 일치를 모두 만족하는 줄만 반환
//!
//! 라우터 범위가 지정되었는데 파티션이 하나도 없으면
//! [`SearchOutcome::RouterNotFound`]입니다 — "찾았지만 일치 0건"과
//! 절대 혼동하지 않습니다.

use chrono::NaiveDateTime;

use conntrail_core::types::LOG_COLUMN_COUNT;

use crate::error::IngestError;
use crate::store::{LogStore, Partition};

/// 저장된 타임스탬프 컬럼의 형식
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 검색 범위
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// 전체 라우터
    All,
    /// 특정 라우터 하나
    Router(String),
}

/// 일치한 줄 하나
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LineMatch {
    /// 줄이 속한 라우터
    pub router: String,
    /// 줄이 속한 파티션 파일 이름
    pub file: String,
    /// 원시 줄 내용
    pub content: String,
}

/// 검색 결과
///
/// `Found(vec![])`(범위는 존재하나 일치 없음)와 `RouterNotFound`(범위
/// 자체가 없음)는 서로 다른 결과입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// 일치한 줄 목록 (0건일 수 있음)
    Found(Vec<LineMatch>),
    /// 지정한 라우터에 파티션이 하나도 없음
    RouterNotFound,
}

/// 구조화 필터
///
/// `None`인 필드는 제약을 두지 않습니다. 컬럼 필터는 모두 대소문자
/// 무시 부분 일치이고, 시간 범위는 `[start, end]` 포함 범위입니다.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// 시간 범위 (포함)
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    /// 가입자 id
    pub subscriber: Option<String>,
    /// 프로토콜
    pub protocol: Option<String>,
    /// MAC 주소
    pub mac: Option<String>,
    /// 로컬 IP
    pub local_ip: Option<String>,
    /// 로컬 포트
    pub local_port: Option<String>,
    /// 원격 IP
    pub remote_ip: Option<String>,
    /// 원격 포트
    pub remote_port: Option<String>,
    /// NAT IP
    pub nat_ip: Option<String>,
    /// NAT 포트
    pub nat_port: Option<String>,
}

impl SearchFilters {
    /// 아무 제약도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.time_range.is_none()
            && self.subscriber.is_none()
            && self.protocol.is_none()
            && self.mac.is_none()
            && self.local_ip.is_none()
            && self.local_port.is_none()
            && self.remote_ip.is_none()
            && self.remote_port.is_none()
            && self.nat_ip.is_none()
            && self.nat_port.is_none()
    }

    /// 줄이 모든 설정된 필터를 만족하는지 검사합니다.
    ///
    /// 필터가 하나도 없으면 항상 통과합니다. 필터가 하나라도 있는데
    /// 줄이 고정 컬럼으로 분해되지 않으면 탈락합니다.
    pub fn matches(&self, line: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let columns: Vec<&str> = line.split(',').collect();
        if columns.len() != LOG_COLUMN_COUNT {
            return false;
        }

        if let Some((start, end)) = &self.time_range {
            match NaiveDateTime::parse_from_str(columns[0], TIME_FORMAT) {
                Ok(time) if time >= *start && time <= *end => {}
                _ => return false,
            }
        }

        let column_filters = [
            (&self.subscriber, columns[2]),
            (&self.protocol, columns[3].trim_matches('"')),
            (&self.mac, columns[4]),
            (&self.local_ip, columns[5]),
            (&self.local_port, columns[6]),
            (&self.remote_ip, columns[7]),
            (&self.remote_port, columns[8]),
            (&self.nat_ip, columns[9]),
            (&self.nat_port, columns[10]),
        ];
        column_filters.iter().all(|(filter, column)| match filter {
            Some(needle) => contains_ci(column, needle),
            None => true,
        })
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// 스캔 기반 검색 엔진
///
/// 저장소 레이아웃 위에서 읽기 전용으로 동작합니다.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    store: LogStore,
}

impl SearchEngine {
    /// 저장소 위에 검색 엔진을 만듭니다.
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// 대소문자 구분 부분 문자열 검색을 수행합니다.
    pub async fn substring(
        &self,
        scope: &SearchScope,
        query: &str,
    ) -> Result<SearchOutcome, IngestError> {
        self.scan(scope, |line| line.contains(query)).await
    }

    /// 구조화 필터 검색을 수행합니다.
    pub async fn filtered(
        &self,
        scope: &SearchScope,
        filters: &SearchFilters,
    ) -> Result<SearchOutcome, IngestError> {
        self.scan(scope, |line| filters.matches(line)).await
    }

    async fn scan<F>(&self, scope: &SearchScope, keep: F) -> Result<SearchOutcome, IngestError>
    where
        F: Fn(&str) -> bool,
    {
        let partitions = self.partitions_in_scope(scope).await?;
        let Some(partitions) = partitions else {
            return Ok(SearchOutcome::RouterNotFound);
        };

        let mut matches = Vec::new();
        for partition in &partitions {
            for line in self.store.read_all(partition).await {
                if keep(&line) {
                    matches.push(LineMatch {
                        router: partition.router.clone(),
                        file: partition.file_name.clone(),
                        content: line,
                    });
                }
            }
        }
        Ok(SearchOutcome::Found(matches))
    }

    /// 범위의 파티션 목록을 해석합니다. 라우터 범위에 파티션이 없으면 `None`.
    async fn partitions_in_scope(
        &self,
        scope: &SearchScope,
    ) -> Result<Option<Vec<Partition>>, IngestError> {
        match scope {
            SearchScope::All => Ok(Some(self.store.list_partitions(None).await?)),
            SearchScope::Router(router) => {
                let partitions = self.store.list_partitions(Some(router)).await?;
                if partitions.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(partitions))
                }
            }
        }
    }
}
