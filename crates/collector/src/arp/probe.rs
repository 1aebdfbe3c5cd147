//! 능동 프로브 -- 이웃 캐시를 채우기 위해 대상에 ICMP echo를 보냅니다.

use std::future::Future;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::CollectorError;

/// 능동 프로브 trait
pub trait Prober: Send + Sync + 'static {
    /// 대상에 프로브를 한 번 보냅니다.
    ///
    /// 구현은 자체 타임아웃으로 대기 시간을 제한해야 합니다.
    fn probe(&self, ip: IpAddr) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// 시스템 `ping` 명령을 사용하는 프로브
#[derive(Debug, Clone)]
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    /// 프로브 타임아웃을 지정하여 생성합니다.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `ping`에 넘길 대기 시간 (초, 최소 1)
    fn wait_secs(&self) -> u64 {
        self.timeout.as_secs().max(1)
    }
}

impl Prober for PingProber {
    async fn probe(&self, ip: IpAddr) -> Result<(), CollectorError> {
        let failed = |reason: String| CollectorError::Probe {
            ip: ip.to_string(),
            reason,
        };

        let mut command = Command::new("ping");
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.wait_secs().to_string())
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // ping 자체 대기 시간에 프로세스 기동 여유 1초
        let deadline = Duration::from_secs(self.wait_secs() + 1);
        let output = tokio::time::timeout(deadline, command.output())
            .await
            .map_err(|_| failed(format!("timed out after {}s", deadline.as_secs())))?
            .map_err(|e| failed(format!("failed to run ping: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(failed(format!(
                "ping exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_secs_is_at_least_one() {
        assert_eq!(PingProber::new(Duration::from_millis(200)).wait_secs(), 1);
        assert_eq!(PingProber::new(Duration::from_secs(3)).wait_secs(), 3);
    }
}
