//! 통합 테스트 — 수집부터 검색까지의 전체 흐름 검증
//!
//! UDP 데이터그램 수신 → 파싱 → 식별자 해석 → 파티션 저장 → 검색의
//! 경로를 실제 소켓과 임시 디렉토리로 검증합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use conntrail_core::pipeline::Pipeline;
use conntrail_core::registry::{RouterDevice, RouterRegistry, SessionSourceConfig};
use conntrail_pipeline::resolver::SessionSource;
use conntrail_pipeline::{
    IngestError, IngestPipelineBuilder, PipelineConfig, SearchFilters, SearchOutcome, SearchScope,
};

fn test_config(base_dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        syslog_bind: "127.0.0.1:0".to_owned(),
        base_dir: base_dir.display().to_string(),
        utc_offset_hours: 0,
        ..Default::default()
    }
}

const CONNTRACK_DATAGRAM: &[u8] = b"<134>prerouting: in:<bob> out:pppoe-out1, \
    src-mac AA:BB:CC:DD:EE:FF, proto TCP (SYN), 10.0.0.5:1234->93.1.1.1:80, len 60, \
    NAT (10.0.0.5:1234->203.0.113.9:40000)";

/// UDP 데이터그램 → 파티션 파일까지의 end-to-end 흐름
#[tokio::test]
async fn udp_datagram_lands_in_partition_file() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = IngestPipelineBuilder::new()
        .config(test_config(tmp.path()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();
    let addr = pipeline.bound_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(CONNTRACK_DATAGRAM, addr).await.unwrap();

    // 수신 → 파싱 → 저장이 끝날 때까지 대기
    let engine = pipeline.search_engine();
    let mut hits = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let SearchOutcome::Found(found) =
            engine.substring(&SearchScope::All, "bob").await.unwrap()
            && !found.is_empty()
        {
            hits = found;
            break;
        }
    }

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].router, "127.0.0.1");
    assert!(hits[0].file.ends_with(".log"));
    let columns: Vec<&str> = hits[0].content.split(',').collect();
    assert_eq!(columns.len(), 11);
    assert_eq!(columns[2], "bob");
    assert_eq!(columns[3], "\"TCP (SYN)\"");
    assert_eq!(columns[10], "40000");

    pipeline.stop().await.unwrap();
}

/// 비추적 태그 메시지는 저장되지 않음
#[tokio::test]
async fn non_conntrack_datagram_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = IngestPipelineBuilder::new()
        .config(test_config(tmp.path()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();
    let addr = pipeline.bound_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(b"<134>forward: dropped packet", addr)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // seen은 증가하지만 persisted는 0
    let snap = pipeline.stats().snapshot_for("127.0.0.1").unwrap();
    assert_eq!(snap.seen, 1);
    assert_eq!(snap.persisted, 0);
    assert!(pipeline.search_engine().substring(&SearchScope::All, "dropped").await.unwrap()
        == SearchOutcome::Found(Vec::new()));

    pipeline.stop().await.unwrap();
}

/// 가입자 id가 없는 메시지를 세션 캐시로 해석하는 흐름
#[tokio::test]
async fn resolver_fills_missing_subscriber() {
    struct StaticSource(HashMap<String, String>);

    #[async_trait]
    impl SessionSource for StaticSource {
        async fn active_sessions(
            &self,
            _device: &RouterDevice,
        ) -> Result<HashMap<String, String>, IngestError> {
            Ok(self.0.clone())
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let registry = RouterRegistry {
        routers: vec![RouterDevice {
            name: "loopback-gw".to_owned(),
            address: "127.0.0.1".to_owned(),
            session_source: Some(SessionSourceConfig {
                host: "127.0.0.1".to_owned(),
                port: 8728,
                username: "api".to_owned(),
                password: "secret".to_owned(),
            }),
        }],
    };
    let sessions: HashMap<String, String> =
        [("10.0.0.5".to_owned(), "carol".to_owned())].into();

    let mut pipeline = IngestPipelineBuilder::new()
        .config(test_config(tmp.path()))
        .registry(registry)
        .session_source(Arc::new(StaticSource(sessions)))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    // 캐시를 먼저 채움
    pipeline.resolver().refresh_now("127.0.0.1").await;

    // 가입자 id가 내장되지 않은 메시지 주입
    pipeline
        .raw_message_sender()
        .send(conntrail_pipeline::RawMessage::new(
            "127.0.0.1",
            "prerouting",
            "out:pppoe-out1, src-mac AA:BB:CC:DD:EE:FF, proto UDP, \
             10.0.0.5:53->8.8.8.8:53, len 52, NAT (10.0.0.5:53->203.0.113.9:40001)",
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = pipeline
        .search_engine()
        .substring(&SearchScope::All, "carol")
        .await
        .unwrap();
    match outcome {
        SearchOutcome::Found(hits) => assert_eq!(hits.len(), 1),
        other => panic!("expected Found, got {other:?}"),
    }

    pipeline.stop().await.unwrap();
}

/// 구조화 필터 검색과 라우터 범위의 상호작용
#[tokio::test]
async fn filtered_search_and_router_scope() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = IngestPipelineBuilder::new()
        .config(test_config(tmp.path()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let tx = pipeline.raw_message_sender();
    for (subscriber, protocol) in [("bob", "TCP (SYN)"), ("alice", "UDP")] {
        tx.send(conntrail_pipeline::RawMessage::new(
            "127.0.0.1",
            "prerouting",
            format!(
                "in:<{subscriber}> out:pppoe-out1, src-mac AA:BB:CC:DD:EE:FF, \
                 proto {protocol}, 10.0.0.5:1234->93.1.1.1:80, len 60, \
                 NAT (10.0.0.5:1234->203.0.113.9:40000)"
            ),
        ))
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let engine = pipeline.search_engine();

    // 대소문자 무시 프로토콜 필터
    let filters = SearchFilters {
        protocol: Some("udp".to_owned()),
        ..Default::default()
    };
    let outcome = engine
        .filtered(&SearchScope::Router("127.0.0.1".to_owned()), &filters)
        .await
        .unwrap();
    match outcome {
        SearchOutcome::Found(hits) => {
            assert_eq!(hits.len(), 1);
            assert!(hits[0].content.contains("alice"));
        }
        other => panic!("expected Found, got {other:?}"),
    }

    // 파티션이 없는 라우터는 RouterNotFound
    let outcome = engine
        .filtered(&SearchScope::Router("10.99.99.99".to_owned()), &filters)
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::RouterNotFound);

    pipeline.stop().await.unwrap();
}
