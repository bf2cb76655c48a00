//! UDP Syslog 수집기
//!
//! 라우터가 UDP syslog로 전송하는 커넥션 추적 메시지를 수신합니다.
//! 각 UDP 데이터그램을 하나의 메시지로 취급하며, 봉투 해석 후
//! [`RawMessage`]로 파이프라인 채널에 전달합니다.

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CollectorStatus, RawMessage};
use crate::error::IngestError;

/// UDP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogUdpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 데이터그램 크기 (바이트). 초과분은 잘립니다.
    pub max_message_size: usize,
}

impl Default for SyslogUdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_message_size: 8192,
        }
    }
}

/// UDP Syslog 수집기
///
/// UDP 소켓에서 메시지를 수신하여 파이프라인으로 전달합니다.
/// 바인드 실패는 시작 에러이며, 개별 수신 실패는 경고 로그 후 계속합니다.
pub struct SyslogUdpCollector {
    /// 수집기 설정
    config: SyslogUdpConfig,
    /// 바인드된 소켓 ([`Self::bind`] 이후에만 존재)
    socket: Option<UdpSocket>,
    /// 수집된 메시지 전송 채널
    tx: mpsc::Sender<RawMessage>,
    /// 종료 신호
    cancel: CancellationToken,
    /// 현재 상태
    status: CollectorStatus,
}

impl SyslogUdpCollector {
    /// 새 UDP syslog 수집기를 생성합니다.
    pub fn new(
        config: SyslogUdpConfig,
        tx: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            socket: None,
            tx,
            cancel,
            status: CollectorStatus::Idle,
        }
    }

    /// UDP 소켓에 바인드합니다.
    ///
    /// 시작 시점에 바인드 실패를 동기적으로 알 수 있도록 [`Self::run`]과
    /// 분리되어 있습니다. 이미 바인드되어 있으면 no-op입니다.
    pub async fn bind(&mut self) -> Result<std::net::SocketAddr, IngestError> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind(&self.config.bind_addr)
                .await
                .map_err(|e| {
                    self.status = CollectorStatus::Error(e.to_string());
                    IngestError::Collector {
                        source_type: "syslog_udp".to_owned(),
                        reason: format!("bind {}: {e}", self.config.bind_addr),
                    }
                })?;
            self.socket = Some(socket);
        }
        self.local_addr()
    }

    /// 바인드된 소켓의 로컬 주소를 반환합니다.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, IngestError> {
        let socket = self.socket.as_ref().ok_or_else(|| IngestError::Collector {
            source_type: "syslog_udp".to_owned(),
            reason: "not bound".to_owned(),
        })?;
        socket.local_addr().map_err(IngestError::Io)
    }

    /// 수집기를 시작합니다.
    ///
    /// 아직 바인드 전이면 먼저 바인드한 뒤 수신 루프를 실행합니다.
    /// 취소 토큰이 발화하거나 파이프라인 채널이 닫힐 때까지 실행됩니다.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        self.bind().await?;
        let Some(socket) = self.socket.take() else {
            return Err(IngestError::Collector {
                source_type: "syslog_udp".to_owned(),
                reason: "not bound".to_owned(),
            });
        };

        info!(bind_addr = %self.config.bind_addr, "syslog udp collector started");
        self.status = CollectorStatus::Running;

        let mut buf = vec![0u8; self.config.max_message_size];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("syslog udp collector stopping");
                    break;
                }
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            let raw = RawMessage::from_datagram(&buf[..len], peer.ip().to_string());
                            debug!(source = %raw.source, tag = %raw.tag, "datagram received");
                            if self.tx.send(raw).await.is_err() {
                                warn!("pipeline channel closed, stopping collector");
                                break;
                            }
                        }
                        Err(e) => {
                            // 일시적 수신 실패는 수집을 멈출 이유가 아님
                            warn!(error = %e, "udp recv failed");
                        }
                    }
                }
            }
        }

        self.status = CollectorStatus::Stopped;
        Ok(())
    }

    /// 바인드 주소를 반환합니다.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }
}
