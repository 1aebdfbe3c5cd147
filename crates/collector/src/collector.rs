//! 수집기 오케스트레이션 -- 수신/추출/해석/버퍼링/저장의 전체 흐름을 관리합니다.
//!
//! [`Collector`]는 core의 [`Pipeline`] trait을 구현하여 `dnsstats-daemon`에서
//! 시작/정지/상태 조회됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! UDP/TCP receivers -> mpsc -> message loop (parse -> pattern -> resolve -> stamp) -> EventBuffer
//!                                                              flush ticker -> EventBuffer -> QueryStore
//!                                                              scan ticker  -> AddressResolver
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dnsstats_core::error::{DnsStatsError, PipelineError};
use dnsstats_core::metrics as m;
use dnsstats_core::pipeline::{HealthStatus, Pipeline};
use dnsstats_core::storage::QueryStore;
use dnsstats_core::types::{MacAddr, QueryEvent, SyslogMessage};

use crate::arp::{AddressResolver, NeighborSource, PingProber, Prober, SystemNeighbors};
use crate::buffer::{EventBuffer, FlushOutcome};
use crate::config::CollectorSettings;
use crate::error::CollectorError;
use crate::parser::SyslogParser;
use crate::pattern::{Pattern, PatternRegistry};
use crate::receiver::{RawMessage, SyslogTcpReceiver, SyslogUdpReceiver, Transport};

/// 수집기 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    /// 생성됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 메시지 한 건을 조회 이벤트로 바꿔 버퍼에 넣는 처리기
///
/// 메시지 루프 태스크와 수집기가 공유합니다.
pub struct MessageHandler<N, P> {
    /// 출처 식별자 -> 패턴
    routes: HashMap<String, Arc<Pattern>>,
    resolver: Option<Arc<AddressResolver<N, P>>>,
    buffer: EventBuffer,
}

impl<N: NeighborSource, P: Prober> MessageHandler<N, P> {
    /// 메시지를 처리합니다.
    ///
    /// 알 수 없는 출처나 추출 실패는 로그를 남기고 에러로 반환하며, 메시지는 버려집니다.
    /// 하드웨어 주소 해석 실패는 이벤트를 버리지 않고 [`MacAddr::ZERO`]로 진행합니다.
    pub async fn handle(&self, message: &SyslogMessage) -> Result<QueryEvent, CollectorError> {
        let source = message.declared_source();

        let Some(pattern) = self.routes.get(&source) else {
            debug!(source = %source, content = %message.content, "unknown source, message dropped");
            counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "unknown_source")
                .increment(1);
            return Err(CollectorError::UnknownSource(source));
        };

        let mut event = match pattern.extract(&message.content) {
            Ok(event) => event,
            Err(e) => {
                debug!(
                    source = %source,
                    pattern = pattern.name(),
                    error = %e,
                    content = %message.content,
                    "extraction failed, message dropped"
                );
                counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "no_match")
                    .increment(1);
                return Err(e);
            }
        };

        event.origin.mac = match &self.resolver {
            Some(resolver) => resolver.find_by_ip(event.origin.address).await,
            None => MacAddr::ZERO,
        };
        event.stamp(message.timestamp, message.source_addr);

        debug!(source = %source, event = %event, "query event buffered");
        self.buffer.append(event.clone()).await;
        Ok(event)
    }
}

/// DNS 조회 수집기
///
/// # 사용 예시
/// ```ignore
/// use dnsstats_collector::{Collector, CollectorSettings, PatternRegistry};
///
/// let mut collector = Collector::builder()
///     .settings(CollectorSettings::from_core(&config)?)
///     .registry(Arc::new(PatternRegistry::with_builtins()))
///     .store(Arc::new(database))
///     .build()?;
///
/// collector.start().await?;
/// ```
pub struct Collector<N = SystemNeighbors, P = PingProber> {
    settings: CollectorSettings,
    handler: Arc<MessageHandler<N, P>>,
    store: Arc<dyn QueryStore>,
    parser: Arc<SyslogParser>,
    state: CollectorState,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    local_addrs: Vec<(Transport, SocketAddr)>,
    last_flush_failed: Arc<AtomicBool>,
}

impl Collector {
    /// 빌더를 생성합니다.
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }
}

impl<N: NeighborSource, P: Prober> Collector<N, P> {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            CollectorState::Initialized => "initialized",
            CollectorState::Running => "running",
            CollectorState::Stopped => "stopped",
        }
    }

    /// 메시지 처리기
    pub fn handler(&self) -> &MessageHandler<N, P> {
        &self.handler
    }

    /// 이벤트 버퍼
    pub fn buffer(&self) -> &EventBuffer {
        &self.handler.buffer
    }

    /// 실행 중인 수신기의 실제 바인드 주소
    pub fn local_addr(&self, transport: Transport) -> Option<SocketAddr> {
        self.local_addrs
            .iter()
            .find(|(t, _)| *t == transport)
            .map(|(_, addr)| *addr)
    }

    /// 버퍼를 즉시 저장합니다.
    ///
    /// 주기 저장과 같은 경로를 사용하며 정지 시에도 호출됩니다.
    pub async fn store_buffer(&self) -> Result<FlushOutcome, CollectorError> {
        flush(&self.handler.buffer, &self.store, &self.last_flush_failed).await
    }

    /// 설정된 전송 방식마다 수신기를 바인드하고 태스크를 띄웁니다.
    async fn spawn_receivers(
        &mut self,
        tx: mpsc::Sender<RawMessage>,
    ) -> Result<(), CollectorError> {
        self.local_addrs.clear();

        for transport in self.settings.transports.clone() {
            let (addr, task) = match transport {
                Transport::Udp => {
                    let receiver =
                        SyslogUdpReceiver::bind(&self.settings.receiver, tx.clone(), self.cancel.clone())
                            .await?;
                    let addr = receiver.local_addr()?;
                    (addr, tokio::spawn(run_receiver(transport, receiver.run())))
                }
                Transport::Tcp => {
                    let receiver =
                        SyslogTcpReceiver::bind(&self.settings.receiver, tx.clone(), self.cancel.clone())
                            .await?;
                    let addr = receiver.local_addr()?;
                    (addr, tokio::spawn(run_receiver(transport, receiver.run())))
                }
            };
            self.local_addrs.push((transport, addr));
            self.tasks.push(task);
        }

        Ok(())
    }

    fn spawn_message_loop(&mut self, mut rx: mpsc::Receiver<RawMessage>) {
        let handler = Arc::clone(&self.handler);
        let parser = Arc::clone(&self.parser);
        let cancel = self.cancel.clone();

        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(raw) => process_raw(&handler, &parser, raw).await,
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        // 수신기가 이미 넘긴 메시지는 마저 처리
                        while let Ok(raw) = rx.try_recv() {
                            process_raw(&handler, &parser, raw).await;
                        }
                        break;
                    }
                }
            }
            debug!("message loop stopped");
        }));
    }

    fn spawn_flush_ticker(&mut self) {
        let buffer = self.handler.buffer.clone();
        let store = Arc::clone(&self.store);
        let failed = Arc::clone(&self.last_flush_failed);
        let cancel = self.cancel.clone();
        let period = self.settings.storage_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // 실패는 flush 내부에서 로그를 남기고 다음 주기에 재시도
                        let _ = flush(&buffer, &store, &failed).await;
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            debug!("flush ticker stopped");
        }));
    }

    fn spawn_scan_ticker(&mut self, resolver: Arc<AddressResolver<N, P>>) {
        let cancel = self.cancel.clone();
        let period = self.settings.scan_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = resolver.scan().await {
                            warn!(error = %e, "address table scan failed, retrying on next interval");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            debug!("scan ticker stopped");
        }));
    }

    async fn join_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "collector task ended abnormally");
            }
        }
    }
}

impl<N: NeighborSource, P: Prober> Pipeline for Collector<N, P> {
    async fn start(&mut self) -> Result<(), DnsStatsError> {
        if self.state == CollectorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            bind = %self.settings.receiver.bind_addr,
            sources = self.settings.sources.len(),
            storage_interval = ?self.settings.storage_interval,
            "starting collector"
        );

        self.cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity);

        if let Err(e) = self.spawn_receivers(tx).await {
            self.cancel.cancel();
            self.join_tasks().await;
            return Err(e.into());
        }
        self.spawn_message_loop(rx);
        self.spawn_flush_ticker();
        if let Some(resolver) = self.handler.resolver.clone() {
            self.spawn_scan_ticker(resolver);
        }

        self.state = CollectorState::Running;
        info!(tasks = self.tasks.len(), "collector started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DnsStatsError> {
        if self.state != CollectorState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping collector");
        self.cancel.cancel();
        self.join_tasks().await;
        self.state = CollectorState::Stopped;

        // 정상 종료 시 버퍼에 남은 이벤트를 저장
        let outcome = self.store_buffer().await?;
        info!(outcome = ?outcome, "collector stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            CollectorState::Running if self.last_flush_failed.load(Ordering::Relaxed) => {
                HealthStatus::Degraded(format!(
                    "last flush failed, {} events waiting",
                    self.handler.buffer.len().await
                ))
            }
            CollectorState::Running => HealthStatus::Healthy,
            CollectorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            CollectorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집기 빌더
///
/// 주소 해석기를 지정하지 않으면 모든 이벤트의 하드웨어 주소는 [`MacAddr::ZERO`]입니다.
pub struct CollectorBuilder<N = SystemNeighbors, P = PingProber> {
    settings: Option<CollectorSettings>,
    registry: Option<Arc<PatternRegistry>>,
    store: Option<Arc<dyn QueryStore>>,
    resolver: Option<Arc<AddressResolver<N, P>>>,
}

impl CollectorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: None,
            registry: None,
            store: None,
            resolver: None,
        }
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NeighborSource, P: Prober> CollectorBuilder<N, P> {
    /// 수집기 설정을 지정합니다.
    pub fn settings(mut self, settings: CollectorSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 패턴 레지스트리를 지정합니다. 지정하지 않으면 내장 패턴만 사용합니다.
    pub fn registry(mut self, registry: Arc<PatternRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<dyn QueryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 주소 해석기를 지정합니다.
    pub fn resolver<N2: NeighborSource, P2: Prober>(
        self,
        resolver: Arc<AddressResolver<N2, P2>>,
    ) -> CollectorBuilder<N2, P2> {
        CollectorBuilder {
            settings: self.settings,
            registry: self.registry,
            store: self.store,
            resolver: Some(resolver),
        }
    }

    /// 설정을 검증하고 수집기를 생성합니다.
    ///
    /// 출처가 등록되지 않은 패턴을 가리키면 설정 에러입니다.
    pub fn build(self) -> Result<Collector<N, P>, CollectorError> {
        let settings = self
            .settings
            .ok_or_else(|| CollectorError::config("collector", "settings are required"))?;
        settings.validate()?;

        let store = self
            .store
            .ok_or_else(|| CollectorError::config("database", "a query store is required"))?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(PatternRegistry::with_builtins()));

        let mut routes = HashMap::with_capacity(settings.sources.len());
        for source in &settings.sources {
            let pattern = registry.find(&source.pattern).ok_or_else(|| {
                CollectorError::config(
                    "collector.sources",
                    format!(
                        "source '{}' references unknown pattern '{}' (registered: {})",
                        source.address,
                        source.pattern,
                        registry.registered()
                    ),
                )
            })?;
            if routes.insert(source.address.clone(), pattern).is_some() {
                warn!(source = %source.address, pattern = %source.pattern, "duplicate source, last entry wins");
            }
        }

        let parser = SyslogParser::new().with_max_input_size(settings.receiver.max_message_size);

        Ok(Collector {
            handler: Arc::new(MessageHandler {
                routes,
                resolver: self.resolver,
                buffer: EventBuffer::new(),
            }),
            settings,
            store,
            parser: Arc::new(parser),
            state: CollectorState::Initialized,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            local_addrs: Vec::new(),
            last_flush_failed: Arc::new(AtomicBool::new(false)),
        })
    }
}

async fn run_receiver(
    transport: Transport,
    run: impl Future<Output = Result<(), CollectorError>>,
) {
    if let Err(e) = run.await {
        error!(transport = %transport, error = %e, "syslog receiver stopped with error");
    }
}

async fn process_raw<N: NeighborSource, P: Prober>(
    handler: &MessageHandler<N, P>,
    parser: &SyslogParser,
    raw: RawMessage,
) {
    match parser.parse_at(&raw.data, raw.peer, raw.received_at) {
        // 처리 실패는 handle 내부에서 로그를 남김
        Ok(message) => {
            let _ = handler.handle(&message).await;
        }
        Err(e) => {
            debug!(peer = %raw.peer, transport = %raw.transport, error = %e, "unparsable syslog message dropped");
            counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "parse_error")
                .increment(1);
        }
    }
}

async fn flush(
    buffer: &EventBuffer,
    store: &Arc<dyn QueryStore>,
    failed: &AtomicBool,
) -> Result<FlushOutcome, CollectorError> {
    let result = buffer.drain_and_commit(Arc::clone(store)).await;
    failed.store(result.is_err(), Ordering::Relaxed);
    result
}
