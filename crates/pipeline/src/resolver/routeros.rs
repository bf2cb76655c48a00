//! RouterOS API 세션 소스
//!
//! RouterOS API 프로토콜(TCP 8728)로 `/ppp/active/print`를 호출하여
//! 활성 PPP 세션의 주소 → 계정명 맵을 가져오는 [`SessionSource`] 구현입니다.
//!
//! # 와이어 프로토콜
//! 문장(sentence)은 길이 접두사 단어(word)의 나열이며 빈 단어(길이 0)로
//! 끝납니다. 단어 길이 인코딩:
//!
//! | 길이 범위        | 바이트 수 | 형식                       |
//! |------------------|-----------|----------------------------|
//! | < 0x80           | 1         | `len`                      |
//! | < 0x4000         | 2         | `len \| 0x8000` (BE)       |
//! | < 0x200000       | 3         | `len \| 0xC00000` (BE)     |
//! | < 0x10000000     | 4         | `len \| 0xE0000000` (BE)   |
//! | 그 외            | 5         | `0xF0` + 4바이트 BE        |
//!
//! 로그인은 6.43 이후 방식(평문 `=name=`/`=password=`)만 지원합니다.
//! 갱신 1회당 커넥션 1개를 열고 닫습니다.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use conntrail_core::registry::{RouterDevice, SessionSourceConfig};

use super::SessionSource;
use crate::error::IngestError;

/// 단어 하나의 최대 허용 길이 (방어적 상한)
const MAX_WORD_LEN: u32 = 1 << 22;

/// RouterOS API 클라이언트
///
/// 상태를 갖지 않으며, 호출마다 장비의 세션 소스 설정으로 새 커넥션을 엽니다.
#[derive(Debug, Default, Clone)]
pub struct RouterOsClient;

impl RouterOsClient {
    /// 새 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionSource for RouterOsClient {
    async fn active_sessions(
        &self,
        device: &RouterDevice,
    ) -> Result<HashMap<String, String>, IngestError> {
        let Some(config) = &device.session_source else {
            return Err(IngestError::SessionSource {
                router: device.address.clone(),
                reason: "no session source configured".to_owned(),
            });
        };

        let mut stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| session_err(&device.address, format!("connect: {e}")))?;

        login(&mut stream, config, &device.address).await?;
        let sessions = fetch_active(&mut stream, &device.address).await?;

        // 갱신당 커넥션 1개 — 응답을 다 읽었으면 닫음
        let _ = stream.shutdown().await;
        debug!(router = %device.address, sessions = sessions.len(), "routeros fetch complete");
        Ok(sessions)
    }
}

fn session_err(router: &str, reason: impl Into<String>) -> IngestError {
    IngestError::SessionSource {
        router: router.to_owned(),
        reason: reason.into(),
    }
}

/// 단어 길이를 인코딩하여 버퍼에 씁니다.
pub fn encode_word_length(len: u32, buf: &mut BytesMut) {
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else if len < 0x4000 {
        buf.put_u16((len as u16) | 0x8000);
    } else if len < 0x20_0000 {
        buf.put_u8(((len >> 16) as u8) | 0xC0);
        buf.put_u16(len as u16);
    } else if len < 0x1000_0000 {
        buf.put_u32(len | 0xE000_0000);
    } else {
        buf.put_u8(0xF0);
        buf.put_u32(len);
    }
}

/// 문장 전체(종결 빈 단어 포함)를 인코딩합니다.
pub fn encode_sentence(words: &[&str]) -> BytesMut {
    let mut buf = BytesMut::new();
    for word in words {
        encode_word_length(word.len() as u32, &mut buf);
        buf.put_slice(word.as_bytes());
    }
    buf.put_u8(0); // 문장 종결
    buf
}

/// 단어 길이를 디코딩합니다.
pub async fn read_word_length<R>(reader: &mut R) -> std::io::Result<u32>
where
    R: AsyncRead + Unpin,
{
    let first = reader.read_u8().await?;
    let len = if first < 0x80 {
        u32::from(first)
    } else if first & 0xC0 == 0x80 {
        (u32::from(first & 0x3F) << 8) | u32::from(reader.read_u8().await?)
    } else if first & 0xE0 == 0xC0 {
        (u32::from(first & 0x1F) << 16) | u32::from(reader.read_u16().await?)
    } else if first & 0xF0 == 0xE0 {
        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest).await?;
        (u32::from(first & 0x0F) << 24)
            | (u32::from(rest[0]) << 16)
            | (u32::from(rest[1]) << 8)
            | u32::from(rest[2])
    } else {
        reader.read_u32().await?
    };
    Ok(len)
}

/// 문장 하나를 읽습니다 (종결 빈 단어 전까지의 단어 목록).
pub async fn read_sentence<R>(reader: &mut R, router: &str) -> Result<Vec<String>, IngestError>
where
    R: AsyncRead + Unpin,
{
    let mut words = Vec::new();
    loop {
        let len = read_word_length(reader)
            .await
            .map_err(|e| session_err(router, format!("read word length: {e}")))?;
        if len == 0 {
            return Ok(words);
        }
        if len > MAX_WORD_LEN {
            return Err(session_err(router, format!("word too long: {len} bytes")));
        }
        let mut word = vec![0u8; len as usize];
        reader
            .read_exact(&mut word)
            .await
            .map_err(|e| session_err(router, format!("read word: {e}")))?;
        words.push(String::from_utf8_lossy(&word).into_owned());
    }
}

async fn write_sentence<W>(writer: &mut W, words: &[&str], router: &str) -> Result<(), IngestError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_sentence(words);
    writer
        .write_all(&buf)
        .await
        .map_err(|e| session_err(router, format!("write sentence: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| session_err(router, format!("flush: {e}")))
}

/// `!trap` 문장에서 에러 메시지를 추출합니다.
fn trap_message(words: &[String]) -> String {
    words
        .iter()
        .find_map(|w| w.strip_prefix("=message="))
        .unwrap_or("trap without message")
        .to_owned()
}

/// 속성 단어(`=key=value`)를 분해합니다.
fn attribute(word: &str) -> Option<(&str, &str)> {
    word.strip_prefix('=')?.split_once('=')
}

/// 6.43 이후 방식의 평문 로그인을 수행합니다.
async fn login<S>(
    stream: &mut S,
    config: &SessionSourceConfig,
    router: &str,
) -> Result<(), IngestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let name = format!("=name={}", config.username);
    let password = format!("=password={}", config.password);
    write_sentence(stream, &["/login", &name, &password], router).await?;

    let reply = read_sentence(stream, router).await?;
    match reply.first().map(String::as_str) {
        Some("!done") => {
            // 6.43 이전 장비는 =ret= 챌린지를 돌려줌 — 지원하지 않음
            if reply.iter().any(|w| w.starts_with("=ret=")) {
                return Err(session_err(router, "pre-6.43 challenge login not supported"));
            }
            Ok(())
        }
        Some("!trap") => Err(session_err(router, format!("login failed: {}", trap_message(&reply)))),
        other => Err(session_err(
            router,
            format!("unexpected login reply: {other:?}"),
        )),
    }
}

/// `/ppp/active/print`를 호출하여 주소 → 계정명 맵을 수집합니다.
async fn fetch_active<S>(stream: &mut S, router: &str) -> Result<HashMap<String, String>, IngestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_sentence(stream, &["/ppp/active/print"], router).await?;

    let mut sessions = HashMap::new();
    loop {
        let sentence = read_sentence(stream, router).await?;
        match sentence.first().map(String::as_str) {
            Some("!re") => {
                let mut address = None;
                let mut name = None;
                for word in &sentence[1..] {
                    match attribute(word) {
                        Some(("address", v)) => address = Some(v.to_owned()),
                        Some(("name", v)) => name = Some(v.to_owned()),
                        _ => {}
                    }
                }
                if let (Some(address), Some(name)) = (address, name) {
                    sessions.insert(address, name);
                }
            }
            Some("!done") => return Ok(sessions),
            Some("!trap") => {
                return Err(session_err(
                    router,
                    format!("print failed: {}", trap_message(&sentence)),
                ));
            }
            other => {
                return Err(session_err(router, format!("unexpected reply: {other:?}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::net::TcpListener;

    async fn round_trip_length(len: u32) -> u32 {
        let mut buf = BytesMut::new();
        encode_word_length(len, &mut buf);
        let mut reader = &buf[..];
        read_word_length(&mut reader).await.unwrap()
    }

    #[tokio::test]
    async fn word_length_boundaries() {
        // 각 인코딩 구간의 경계값
        for len in [
            0u32,
            1,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
            0x1000_0000,
            u32::MAX,
        ] {
            assert_eq!(round_trip_length(len).await, len, "len = {len:#x}");
        }
    }

    #[test]
    fn encoded_length_sizes() {
        let size = |len: u32| {
            let mut buf = BytesMut::new();
            encode_word_length(len, &mut buf);
            buf.len()
        };
        assert_eq!(size(0x7F), 1);
        assert_eq!(size(0x80), 2);
        assert_eq!(size(0x3FFF), 2);
        assert_eq!(size(0x4000), 3);
        assert_eq!(size(0x1F_FFFF), 3);
        assert_eq!(size(0x20_0000), 4);
        assert_eq!(size(0x0FFF_FFFF), 4);
        assert_eq!(size(0x1000_0000), 5);
    }

    #[tokio::test]
    async fn sentence_round_trip() {
        let buf = encode_sentence(&["/login", "=name=api", "=password=secret"]);
        let mut reader = &buf[..];
        let words = read_sentence(&mut reader, "test").await.unwrap();
        assert_eq!(words, vec!["/login", "=name=api", "=password=secret"]);
    }

    #[tokio::test]
    async fn empty_sentence_round_trip() {
        let buf = encode_sentence(&[]);
        let mut reader = &buf[..];
        let words = read_sentence(&mut reader, "test").await.unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn attribute_parsing() {
        assert_eq!(attribute("=address=10.0.0.5"), Some(("address", "10.0.0.5")));
        assert_eq!(attribute("=name=bob"), Some(("name", "bob")));
        assert_eq!(attribute("!re"), None);
        assert_eq!(attribute("=malformed"), None);
    }

    #[tokio::test]
    async fn login_and_fetch_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            // /login 수신 확인
            let words = read_sentence(&mut server, "srv").await.unwrap();
            assert_eq!(words[0], "/login");
            assert!(words.contains(&"=name=api".to_owned()));
            server.write_all(&encode_sentence(&["!done"])).await.unwrap();

            // /ppp/active/print 수신 후 세션 2건 응답
            let words = read_sentence(&mut server, "srv").await.unwrap();
            assert_eq!(words, vec!["/ppp/active/print"]);
            server
                .write_all(&encode_sentence(&[
                    "!re",
                    "=name=bob",
                    "=address=10.0.0.5",
                    "=service=pppoe",
                ]))
                .await
                .unwrap();
            server
                .write_all(&encode_sentence(&["!re", "=name=alice", "=address=10.0.0.6"]))
                .await
                .unwrap();
            server.write_all(&encode_sentence(&["!done"])).await.unwrap();
        });

        let config = SessionSourceConfig {
            host: "unused".to_owned(),
            port: 8728,
            username: "api".to_owned(),
            password: "secret".to_owned(),
        };
        login(&mut client, &config, "10.0.0.1").await.unwrap();
        let sessions = fetch_active(&mut client, "10.0.0.1").await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.get("10.0.0.5").map(String::as_str), Some("bob"));
        assert_eq!(sessions.get("10.0.0.6").map(String::as_str), Some("alice"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn login_trap_is_error() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let _ = read_sentence(&mut server, "srv").await.unwrap();
            server
                .write_all(&encode_sentence(&["!trap", "=message=invalid user name or password"]))
                .await
                .unwrap();
        });

        let config = SessionSourceConfig {
            host: "unused".to_owned(),
            port: 8728,
            username: "api".to_owned(),
            password: "wrong".to_owned(),
        };
        let err = login(&mut client, &config, "10.0.0.1").await.unwrap_err();
        assert!(err.to_string().contains("invalid user name or password"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn challenge_login_rejected() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let _ = read_sentence(&mut server, "srv").await.unwrap();
            server
                .write_all(&encode_sentence(&["!done", "=ret=abcdef0123456789"]))
                .await
                .unwrap();
        });

        let config = SessionSourceConfig {
            host: "unused".to_owned(),
            port: 8728,
            username: "api".to_owned(),
            password: "secret".to_owned(),
        };
        let err = login(&mut client, &config, "10.0.0.1").await.unwrap_err();
        assert!(err.to_string().contains("not supported"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn full_client_against_fake_router() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_sentence(&mut stream, "srv").await.unwrap();
            stream.write_all(&encode_sentence(&["!done"])).await.unwrap();
            let _ = read_sentence(&mut stream, "srv").await.unwrap();
            stream
                .write_all(&encode_sentence(&["!re", "=name=bob", "=address=10.0.0.5"]))
                .await
                .unwrap();
            stream.write_all(&encode_sentence(&["!done"])).await.unwrap();
        });

        let device = RouterDevice {
            name: "office-gw".to_owned(),
            address: "10.0.0.1".to_owned(),
            session_source: Some(SessionSourceConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                username: "api".to_owned(),
                password: "secret".to_owned(),
            }),
        };

        let client = Arc::new(RouterOsClient::new());
        let sessions = client.active_sessions(&device).await.unwrap();
        assert_eq!(sessions.get("10.0.0.5").map(String::as_str), Some("bob"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_session_source_is_error() {
        let device = RouterDevice {
            name: "branch-gw".to_owned(),
            address: "10.0.0.2".to_owned(),
            session_source: None,
        };
        let client = RouterOsClient::new();
        assert!(client.active_sessions(&device).await.is_err());
    }
}
