//! UDP syslog 수신기
//!
//! 각 데이터그램을 메시지 하나로 취급합니다. 채널이 가득 차면 메시지를 버립니다.

use std::net::SocketAddr;

use bytes::Bytes;
use metrics::counter;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dnsstats_core::metrics as m;

use super::{RawMessage, ReceiverConfig, Transport};
use crate::error::CollectorError;

/// UDP syslog 수신기
pub struct SyslogUdpReceiver {
    socket: UdpSocket,
    max_message_size: usize,
    tx: mpsc::Sender<RawMessage>,
    cancel: CancellationToken,
}

impl SyslogUdpReceiver {
    /// 소켓을 바인드합니다.
    ///
    /// 바인드 실패는 시작 에러로 전파됩니다.
    pub async fn bind(
        config: &ReceiverConfig,
        tx: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|e| CollectorError::Receiver {
                transport: Transport::Udp.to_string(),
                reason: format!("failed to bind to {}: {e}", config.bind_addr),
            })?;

        Ok(Self {
            socket,
            max_message_size: config.max_message_size,
            tx,
            cancel,
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, CollectorError> {
        Ok(self.socket.local_addr()?)
    }

    /// 취소될 때까지 데이터그램을 수신합니다.
    pub async fn run(self) -> Result<(), CollectorError> {
        let local = self.local_addr()?;
        info!(addr = %local, "UDP syslog receiver listening");

        // 최대 크기 초과를 감지하기 위해 한 바이트 여유를 둡니다
        let mut buf = vec![0u8; self.max_message_size + 1];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "UDP receive error");
                            continue;
                        }
                    };

                    counter!(m::COLLECTOR_MESSAGES_RECEIVED_TOTAL, m::LABEL_TRANSPORT => "udp")
                        .increment(1);

                    if len > self.max_message_size {
                        warn!(peer = %peer, max = self.max_message_size, "datagram exceeds max size, dropped");
                        counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "too_large")
                            .increment(1);
                        continue;
                    }

                    let message = RawMessage::new(
                        Bytes::copy_from_slice(&buf[..len]),
                        peer,
                        Transport::Udp,
                    );
                    match self.tx.try_send(message) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!(peer = %peer, "channel full, datagram dropped");
                            counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "channel_full")
                                .increment(1);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("message channel closed, stopping UDP receiver");
                            break;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("UDP syslog receiver received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}
