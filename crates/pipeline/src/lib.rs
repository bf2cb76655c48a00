#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: syslog UDP 수신 및 메시지 봉투(envelope) 해석
//! - [`parser`]: 커넥션 추적 메시지 → [`ConnectionEvent`](conntrail_core::types::ConnectionEvent)
//! - [`resolver`]: 라우터별 로컬 IP → 가입자 id 캐시 (RouterOS API 세션 소스)
//! - [`store`]: (라우터, 시간 버킷) 파티션 append-only 저장소
//! - [`search`]: 파티션 스캔 기반 부분 문자열/구조화 필터 검색
//! - [`pipeline`]: 전체 수집 흐름 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! SyslogUdpCollector -> mpsc -> ConntrackParser -> IdentityResolver -> LogStore
//!        |                          |                   |                 |
//!   UDP datagram             delimiter cuts      RouterOS sessions   hourly files
//! ```
//!
//! SearchEngine은 저장소 레이아웃 위에서 독립적으로, 읽기 전용으로 동작합니다.

pub mod config;
pub mod error;
pub mod pipeline;

pub mod collector;
pub mod parser;
pub mod resolver;
pub mod search;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::IngestError;

// 수집기
pub use collector::{RawMessage, SyslogUdpCollector};

// 파서
pub use parser::ConntrackParser;

// 식별자 해석
pub use resolver::{IdentityResolver, SessionSource};

// 저장소/검색
pub use search::{LineMatch, SearchEngine, SearchFilters, SearchOutcome, SearchScope};
pub use store::{LogStore, Partition};
