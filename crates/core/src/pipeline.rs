//! 파이프라인 trait — 모듈 생명주기 확장 포인트 정의

use crate::error::ConntrailError;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이나 주의 필요
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// Unhealthy 여부를 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 생명주기 관리 trait
///
/// `conntrail-daemon`은 이 trait을 통해 모듈을 동일한
/// start/stop/health_check 주기로 관리합니다.
pub trait Pipeline {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), ConntrailError>> + Send;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), ConntrailError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_detection() {
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
        assert!(!HealthStatus::Healthy.is_unhealthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
    }
}
