//! 라우터 레지스트리 — 수집 대상 라우터 장비 목록
//!
//! `routers.toml`의 `[[router]]` 테이블을 읽어 [`RouterDevice`] 목록을
//! 제공합니다. 레지스트리는 코어에 대해 읽기 전용이며, 생성/삭제 등
//! 수명주기는 외부 협력자가 소유합니다.
//!
//! # 레지스트리 형식
//! ```toml
//! [[router]]
//! name = "office-gw"
//! address = "10.0.0.1"
//!
//! [router.session_source]
//! host = "10.0.0.1"
//! username = "api"
//! password = "secret"
//! port = 8728
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConntrailError, RegistryError};

/// RouterOS API 기본 포트
pub const DEFAULT_API_PORT: u16 = 8728;

/// 라우터 장비의 세션 소스 접속 정보
///
/// 가입자 세션을 조회할 관리 인터페이스 자격 증명입니다.
/// 이 정보가 없는 라우터는 Identity Resolver의 조회 대상이 아닙니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSourceConfig {
    /// 관리 인터페이스 호스트
    pub host: String,
    /// 관리 인터페이스 포트
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// 로그인 계정
    pub username: String,
    /// 로그인 비밀번호
    pub password: String,
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

/// 라우터 장비
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterDevice {
    /// 표시 이름
    pub name: String,
    /// 네트워크 주소 — syslog 송신 주소와 매칭되는 키
    pub address: String,
    /// 세션 조회용 관리 인터페이스 (선택)
    #[serde(default)]
    pub session_source: Option<SessionSourceConfig>,
}

/// 라우터 레지스트리
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterRegistry {
    /// 등록된 라우터 목록
    #[serde(default, rename = "router")]
    pub routers: Vec<RouterDevice>,
}

impl RouterRegistry {
    /// TOML 파일에서 레지스트리를 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConntrailError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConntrailError::Registry(RegistryError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ConntrailError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 레지스트리를 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ConntrailError> {
        toml::from_str(toml_str).map_err(|e| {
            ConntrailError::Registry(RegistryError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 주소로 라우터를 찾습니다.
    pub fn find_by_address(&self, address: &str) -> Option<&RouterDevice> {
        self.routers.iter().find(|r| r.address == address)
    }

    /// 세션 소스가 설정된 라우터 목록을 반환합니다.
    pub fn with_session_source(&self) -> impl Iterator<Item = &RouterDevice> {
        self.routers.iter().filter(|r| r.session_source.is_some())
    }

    /// 등록된 라우터 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// 라우터가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[router]]
name = "office-gw"
address = "10.0.0.1"

[router.session_source]
host = "10.0.0.1"
username = "api"
password = "secret"

[[router]]
name = "branch-gw"
address = "10.0.0.2"
"#;

    #[test]
    fn parse_sample_registry() {
        let registry = RouterRegistry::parse(SAMPLE).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());

        let office = registry.find_by_address("10.0.0.1").unwrap();
        assert_eq!(office.name, "office-gw");
        let source = office.session_source.as_ref().unwrap();
        assert_eq!(source.host, "10.0.0.1");
        assert_eq!(source.port, DEFAULT_API_PORT); // 포트 생략 시 기본값
        assert_eq!(source.username, "api");
    }

    #[test]
    fn session_source_is_optional() {
        let registry = RouterRegistry::parse(SAMPLE).unwrap();
        let branch = registry.find_by_address("10.0.0.2").unwrap();
        assert!(branch.session_source.is_none());
    }

    #[test]
    fn with_session_source_filters() {
        let registry = RouterRegistry::parse(SAMPLE).unwrap();
        let polled: Vec<_> = registry.with_session_source().collect();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].address, "10.0.0.1");
    }

    #[test]
    fn unknown_address_not_found() {
        let registry = RouterRegistry::parse(SAMPLE).unwrap();
        assert!(registry.find_by_address("192.168.88.1").is_none());
    }

    #[test]
    fn empty_registry_parses() {
        let registry = RouterRegistry::parse("").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_registry_fails() {
        assert!(RouterRegistry::parse("[[router]]\nname = 3").is_err());
    }

    #[tokio::test]
    async fn load_missing_file_reports_not_found() {
        let result = RouterRegistry::load("/nonexistent/routers.toml").await;
        match result {
            Err(ConntrailError::Registry(RegistryError::FileNotFound { path })) => {
                assert!(path.contains("routers.toml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
}
