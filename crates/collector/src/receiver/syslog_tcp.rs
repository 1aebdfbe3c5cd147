//! TCP syslog 수신기
//!
//! 개행으로 구분된 메시지를 받습니다. 각 연결은 별도의 tokio 태스크에서 처리되며
//! 동시 연결 수는 세마포어로 제한됩니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dnsstats_core::metrics as m;

use super::{RawMessage, ReceiverConfig, Transport};
use crate::error::CollectorError;

/// TCP syslog 수신기
pub struct SyslogTcpReceiver {
    listener: TcpListener,
    config: ReceiverConfig,
    tx: mpsc::Sender<RawMessage>,
    cancel: CancellationToken,
}

impl SyslogTcpReceiver {
    /// 리스너를 바인드합니다.
    pub async fn bind(
        config: &ReceiverConfig,
        tx: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|e| receiver_error(format!("failed to bind to {}: {e}", config.bind_addr)))?;

        Ok(Self {
            listener,
            config: config.clone(),
            tx,
            cancel,
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, CollectorError> {
        Ok(self.listener.local_addr()?)
    }

    /// 취소될 때까지 연결을 수락합니다.
    pub async fn run(self) -> Result<(), CollectorError> {
        let local = self.local_addr()?;
        info!(addr = %local, max_connections = self.config.max_connections, "TCP syslog receiver listening");

        let connection_semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "TCP accept error");
                            continue;
                        }
                    };

                    let permit = match connection_semaphore.clone().try_acquire_owned() {
                        Ok(p) => p,
                        Err(_) => {
                            warn!(peer = %peer, "max connections reached, rejecting connection");
                            continue;
                        }
                    };

                    debug!(peer = %peer, "accepted connection");

                    let tx = self.tx.clone();
                    let cancel = self.cancel.clone();
                    let max_message_size = self.config.max_message_size;
                    let idle_timeout = self.config.idle_timeout;

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, peer, tx, max_message_size, idle_timeout, cancel).await
                        {
                            debug!(peer = %peer, error = %e, "connection closed with error");
                        }
                        drop(permit);
                    });
                }
                _ = self.cancel.cancelled() => {
                    info!("TCP syslog receiver received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// 단일 연결에서 개행 구분 메시지를 읽습니다.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<RawMessage>,
    max_message_size: usize,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> Result<(), CollectorError> {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    // 개행 없이 최대 크기를 넘는 입력을 감지할 수 있도록 한 바이트 더 읽습니다
    let read_limit = max_message_size as u64 + 1;

    loop {
        line.clear();
        let mut bounded = (&mut reader).take(read_limit);

        tokio::select! {
            result = timeout(idle_timeout, bounded.read_until(b'\n', &mut line)) => {
                match result {
                    Ok(Ok(0)) => {
                        debug!(peer = %peer, "connection closed by peer");
                        break;
                    }
                    Ok(Ok(_)) => {
                        counter!(m::COLLECTOR_MESSAGES_RECEIVED_TOTAL, m::LABEL_TRANSPORT => "tcp")
                            .increment(1);

                        if line.len() > max_message_size {
                            warn!(peer = %peer, size = line.len(), max = max_message_size, "message exceeds max size, closing connection");
                            counter!(m::COLLECTOR_MESSAGES_DROPPED_TOTAL, m::LABEL_REASON => "too_large")
                                .increment(1);
                            break;
                        }

                        let trimmed = line.trim_ascii_end();
                        if trimmed.is_empty() {
                            continue;
                        }

                        let message = RawMessage::new(
                            Bytes::copy_from_slice(trimmed),
                            peer,
                            Transport::Tcp,
                        );
                        if let Err(e) = tx.send(message).await {
                            error!(error = %e, "failed to send message to channel");
                            return Err(CollectorError::Channel(e.to_string()));
                        }
                    }
                    Ok(Err(e)) => {
                        return Err(receiver_error(format!("read error from {peer}: {e}")));
                    }
                    Err(_) => {
                        debug!(peer = %peer, "idle connection timed out");
                        return Err(receiver_error(format!("idle timeout from {peer}")));
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!(peer = %peer, "connection handler received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

fn receiver_error(reason: String) -> CollectorError {
    CollectorError::Receiver {
        transport: Transport::Tcp.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn local_config() -> ReceiverConfig {
        ReceiverConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            max_message_size: 64,
            max_connections: 2,
            idle_timeout: Duration::from_secs(5),
        }
    }

    async fn start(
        config: ReceiverConfig,
    ) -> (
        SocketAddr,
        mpsc::Receiver<RawMessage>,
        CancellationToken,
        tokio::task::JoinHandle<Result<(), CollectorError>>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let receiver = SyslogTcpReceiver::bind(&config, tx, cancel.clone())
            .await
            .unwrap();
        let addr = receiver.local_addr().unwrap();
        let handle = tokio::spawn(receiver.run());
        (addr, rx, cancel, handle)
    }

    async fn recv(rx: &mut mpsc::Receiver<RawMessage>) -> RawMessage {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn splits_lines_and_skips_blank_ones() {
        let (addr, mut rx, cancel, handle) = start(local_config()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"first\r\n\nsecond\n").await.unwrap();

        assert_eq!(&recv(&mut rx).await.data[..], b"first");
        let second = recv(&mut rx).await;
        assert_eq!(&second.data[..], b"second");
        assert_eq!(second.transport, Transport::Tcp);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_line_closes_connection() {
        let (addr, mut rx, cancel, handle) = start(local_config()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut payload = vec![b'x'; 128];
        payload.push(b'\n');
        client.write_all(&payload).await.unwrap();

        let mut other = TcpStream::connect(addr).await.unwrap();
        other.write_all(b"ok\n").await.unwrap();
        assert_eq!(&recv(&mut rx).await.data[..], b"ok");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unterminated_stream_past_max_size_is_cut_off() {
        let config = ReceiverConfig {
            idle_timeout: Duration::from_secs(30),
            ..local_config()
        };
        let (addr, mut rx, cancel, handle) = start(config).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[b'x'; 128]).await.unwrap();

        // 개행이 오지 않아도 유휴 타임아웃 전에 연결이 닫혀야 합니다
        let mut buf = [0u8; 16];
        let closed = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("connection should be closed before idle timeout");
        assert!(matches!(closed, Ok(0) | Err(_)));
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn final_line_without_newline_is_delivered_on_eof() {
        let (addr, mut rx, cancel, handle) = start(local_config()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"tail").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(&recv(&mut rx).await.data[..], b"tail");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
