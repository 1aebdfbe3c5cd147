//! IP -> 하드웨어 주소 원천
//!
//! - 커널 이웃(ARP) 캐시 파일 (`/proc/net/arp`)
//! - 로컬 네트워크 인터페이스 (`pnet::datalink`)

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use dnsstats_core::types::MacAddr;

use crate::error::CollectorError;

/// IP/하드웨어 주소 쌍 목록
pub type NeighborEntries = Vec<(IpAddr, MacAddr)>;

/// 주소 테이블의 원천
///
/// 테스트에서는 mock 구현으로 교체합니다.
pub trait NeighborSource: Send + Sync + 'static {
    /// 운영체제 이웃 캐시의 현재 내용을 읽습니다.
    ///
    /// 한 줄이라도 해석할 수 없으면 전체가 에러입니다.
    fn neighbors(&self) -> impl Future<Output = Result<NeighborEntries, CollectorError>> + Send;

    /// 로컬 인터페이스의 IP/하드웨어 주소 쌍을 반환합니다.
    ///
    /// 하드웨어 주소가 없는 인터페이스(loopback 등)는 제외됩니다.
    fn interfaces(&self) -> Result<NeighborEntries, CollectorError>;
}

/// 실제 시스템 원천
#[derive(Debug, Clone)]
pub struct SystemNeighbors {
    table_path: PathBuf,
}

impl SystemNeighbors {
    /// 이웃 캐시 파일 경로를 지정하여 생성합니다.
    pub fn new(table_path: impl Into<PathBuf>) -> Self {
        Self {
            table_path: table_path.into(),
        }
    }

    /// 이웃 캐시 파일 경로
    pub fn table_path(&self) -> &Path {
        &self.table_path
    }
}

impl NeighborSource for SystemNeighbors {
    async fn neighbors(&self) -> Result<NeighborEntries, CollectorError> {
        let content = tokio::fs::read_to_string(&self.table_path)
            .await
            .map_err(|e| {
                CollectorError::Resolver(format!("{}: {e}", self.table_path.display()))
            })?;
        parse_arp_table(&content)
    }

    fn interfaces(&self) -> Result<NeighborEntries, CollectorError> {
        local_interfaces()
    }
}

/// `/proc/net/arp` 형식을 파싱합니다.
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.0.1      0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
/// ```
///
/// 첫 줄(헤더)과 빈 줄은 건너뜁니다.
pub fn parse_arp_table(content: &str) -> Result<NeighborEntries, CollectorError> {
    let mut entries = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if index == 0 || line.trim().is_empty() {
            continue;
        }

        let line_no = index + 1;
        let columns: Vec<&str> = line.split_whitespace().collect();
        let (Some(ip), Some(mac)) = (columns.first(), columns.get(3)) else {
            return Err(CollectorError::Resolver(format!(
                "line {line_no}: expected at least 4 columns"
            )));
        };

        let ip: IpAddr = ip.parse().map_err(|_| {
            CollectorError::Resolver(format!("line {line_no}: invalid IP address '{ip}'"))
        })?;
        let mac: MacAddr = mac
            .parse()
            .map_err(|e| CollectorError::Resolver(format!("line {line_no}: {e}")))?;

        entries.push((ip, mac));
    }

    Ok(entries)
}

fn local_interfaces() -> Result<NeighborEntries, CollectorError> {
    let interfaces = pnet::datalink::interfaces().into_iter().map(|iface| {
        let ips = iface.ips.iter().map(|network| network.ip()).collect();
        (iface.name, iface.mac.map(MacAddr::from), ips)
    });
    Ok(pair_interface_addresses(interfaces))
}

/// 인터페이스 이름별 하드웨어 주소와 IP 목록을 짝지어 펼칩니다.
///
/// 별칭 인터페이스(`eth0:1`)는 물리 인터페이스의 하드웨어 주소를 씁니다.
/// 하드웨어 주소가 없거나 0인 인터페이스의 IP는 제외됩니다.
fn pair_interface_addresses<I>(interfaces: I) -> NeighborEntries
where
    I: IntoIterator<Item = (String, Option<MacAddr>, Vec<IpAddr>)>,
{
    let interfaces: Vec<_> = interfaces.into_iter().collect();
    let base_name = |name: &str| name.split(':').next().unwrap_or_default().to_owned();

    let macs: HashMap<String, MacAddr> = interfaces
        .iter()
        .filter_map(|(name, mac, _)| mac.filter(|m| !m.is_zero()).map(|m| (base_name(name), m)))
        .collect();

    interfaces
        .into_iter()
        .flat_map(|(name, _, ips)| {
            let mac = macs.get(&base_name(&name)).copied();
            ips.into_iter().filter_map(move |ip| mac.map(|m| (ip, m)))
        })
        .collect()
}
