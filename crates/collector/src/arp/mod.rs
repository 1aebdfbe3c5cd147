//! 주소 해석기 -- 장비 IP를 하드웨어(MAC) 주소로 변환합니다.
//!
//! 주기적인 [`AddressResolver::scan`]이 운영체제 이웃 캐시와 로컬 인터페이스를
//! 테이블에 병합하고, [`AddressResolver::find_by_ip`]는 테이블에 없는 IP에 대해
//! 능동 프로브를 한 번 보낸 뒤 다시 확인합니다.
//!
//! 테이블은 읽기/쓰기 잠금 하나로 보호되며 프로브 대기 중에는 잠금을 잡지 않습니다.

pub mod neighbor;
pub mod probe;

pub use neighbor::{NeighborEntries, NeighborSource, SystemNeighbors, parse_arp_table};
pub use probe::{PingProber, Prober};

use std::collections::HashMap;
use std::net::IpAddr;

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use dnsstats_core::metrics as m;
use dnsstats_core::types::MacAddr;

use crate::error::CollectorError;

/// IP -> 하드웨어 주소 테이블
pub struct AddressResolver<N, P> {
    source: N,
    prober: P,
    table: RwLock<HashMap<IpAddr, MacAddr>>,
}

impl<N: NeighborSource, P: Prober> AddressResolver<N, P> {
    /// 빈 테이블로 해석기를 생성합니다.
    pub fn new(source: N, prober: P) -> Self {
        Self {
            source,
            prober,
            table: RwLock::new(HashMap::new()),
        }
    }

    /// 이웃 캐시와 로컬 인터페이스를 테이블에 병합합니다.
    ///
    /// 입력을 모두 읽은 뒤에 쓰기 잠금을 잡으므로, 에러가 나면 테이블은 변경되지 않습니다.
    /// 성공 시 테이블 크기를 반환합니다.
    pub async fn scan(&self) -> Result<usize, CollectorError> {
        let mut entries = self.source.neighbors().await?;
        entries.extend(self.source.interfaces()?);

        let mut table = self.table.write().await;
        for (ip, mac) in entries {
            if table.insert(ip, mac).is_none() {
                info!(ip = %ip, mac = %mac, "new address table entry");
            }
        }

        let len = table.len();
        gauge!(m::ARP_ENTRIES).set(len as f64);
        debug!(entries = len, "address table scanned");
        Ok(len)
    }

    /// IP의 하드웨어 주소를 반환합니다.
    ///
    /// 테이블에 없으면 프로브를 한 번 보내고 이웃 캐시를 다시 읽습니다.
    /// 그래도 없거나 프로브가 실패하면 [`MacAddr::ZERO`]를 기록하고 반환하므로
    /// 다음 스캔 전까지 같은 IP를 다시 프로브하지 않습니다.
    pub async fn find_by_ip(&self, ip: IpAddr) -> MacAddr {
        if let Some(mac) = self.get(ip).await {
            return mac;
        }

        let resolved = match self.prober.probe(ip).await {
            Ok(()) => {
                counter!(m::ARP_PROBES_TOTAL, m::LABEL_RESULT => "success").increment(1);
                self.lookup_neighbor(ip).await
            }
            Err(e) => {
                counter!(m::ARP_PROBES_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                warn!(ip = %ip, error = %e, "address probe failed");
                None
            }
        };

        let mut table = self.table.write().await;
        // 프로브 중 스캔이 채운 값이 있으면 그것을 유지
        let mac = *table.entry(ip).or_insert(resolved.unwrap_or(MacAddr::ZERO));
        if resolved.is_some() {
            info!(ip = %ip, mac = %mac, "new address table entry");
        }
        gauge!(m::ARP_ENTRIES).set(table.len() as f64);
        mac
    }

    /// 프로브 없이 테이블만 조회합니다.
    pub async fn get(&self, ip: IpAddr) -> Option<MacAddr> {
        self.table.read().await.get(&ip).copied()
    }

    /// 테이블 엔트리 수
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    /// 테이블이 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    async fn lookup_neighbor(&self, ip: IpAddr) -> Option<MacAddr> {
        match self.source.neighbors().await {
            Ok(entries) => entries
                .into_iter()
                .find(|(candidate, _)| *candidate == ip)
                .map(|(_, mac)| mac),
            Err(e) => {
                warn!(ip = %ip, error = %e, "failed to re-read neighbor table after probe");
                None
            }
        }
    }
}
