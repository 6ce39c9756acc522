//! UDP 报文接入：接收循环、报文解析与启停控制。

use async_trait::async_trait;
use domain::{NodeId, RawFrame};
use oem_telemetry::TelemetryMetrics;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 单个报文的接收缓冲大小。
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// 接收出错后的等待时间，避免持续错误时空转。
pub const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("source error: {0}")]
    Source(String),
}

/// RawFrame 处理器。
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle(&self, frame: RawFrame) -> Result<(), IngestError>;
}

/// UDP 采集源配置。
#[derive(Debug, Clone)]
pub struct UdpSourceConfig {
    pub host: String,
    pub port: u16,
}

impl Default for UdpSourceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
        }
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// UDP 接收器。
///
/// 后台任务独占 socket，逐个接收并同步处理报文；`stop` 发出停止信号并等待任务结束。
pub struct UdpReceiver {
    config: UdpSourceConfig,
    handler: Arc<dyn FrameHandler>,
    metrics: Arc<TelemetryMetrics>,
    running: Mutex<Option<Running>>,
    // start/stop 互斥，检查、绑定与登记在同一临界区内完成
    lifecycle: tokio::sync::Mutex<()>,
}

impl UdpReceiver {
    pub fn new(
        config: UdpSourceConfig,
        handler: Arc<dyn FrameHandler>,
        metrics: Arc<TelemetryMetrics>,
    ) -> Self {
        Self {
            config,
            handler,
            metrics,
            running: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// 绑定端口并启动接收任务，返回实际监听地址；已在运行时直接返回当前地址。
    pub async fn start(&self) -> Result<SocketAddr, IngestError> {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(addr) = self.running_addr()? {
            return Ok(addr);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|err| IngestError::Source(format!("bind {}: {}", addr, err)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|err| IngestError::Source(err.to_string()))?;
        info!(target: "oem.ingest", %local_addr, "waiting data from udp port");

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(receive_loop(
            socket,
            self.handler.clone(),
            self.metrics.clone(),
            stop_rx,
        ));

        let mut running = self
            .running
            .lock()
            .map_err(|_| IngestError::Source("receiver state poisoned".to_string()))?;
        *running = Some(Running {
            stop_tx,
            handle,
            local_addr,
        });
        Ok(local_addr)
    }

    /// 发出停止信号并等待接收任务退出。
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(running) = running else {
            return;
        };
        debug!(target: "oem.ingest", "stopping udp receiver");
        let _ = running.stop_tx.send(true);
        if let Err(err) = running.handle.await {
            warn!(target: "oem.ingest", error = %err, "udp receiver task failed");
        }
        debug!(target: "oem.ingest", "udp receiver stopped");
    }

    /// 接收任务正在运行时为健康。
    pub fn is_healthy(&self) -> bool {
        self.running
            .lock()
            .map(|guard| {
                guard
                    .as_ref()
                    .map(|running| !running.handle.is_finished())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn running_addr(&self) -> Result<Option<SocketAddr>, IngestError> {
        let guard = self
            .running
            .lock()
            .map_err(|_| IngestError::Source("receiver state poisoned".to_string()))?;
        Ok(guard.as_ref().map(|running| running.local_addr))
    }
}

async fn receive_loop(
    socket: UdpSocket,
    handler: Arc<dyn FrameHandler>,
    metrics: Arc<TelemetryMetrics>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        if *stop_rx.borrow() {
            break;
        }
        let received = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            received = socket.recv_from(&mut buf) => received,
        };

        let (len, peer) = match received {
            Ok(received) => received,
            Err(err) => {
                metrics.record_error();
                error!(target: "oem.ingest", "Error occurred: {}", err);
                debug!(target: "oem.ingest", error = ?err, "udp receive failed");
                if pause_after_error(&mut stop_rx).await {
                    break;
                }
                continue;
            }
        };
        metrics.record_received();

        if len == 0 {
            debug!(target: "oem.ingest", %peer, "No data");
            continue;
        }

        let data = &buf[..len];
        if let Err(err) = handle_datagram(data, handler.as_ref()).await {
            metrics.record_error();
            error!(target: "oem.ingest", %peer, "Error occurred: {}", err);
            debug!(
                target: "oem.ingest",
                %peer,
                error = ?err,
                datagram = %String::from_utf8_lossy(data),
                "datagram_failed"
            );
        }
    }
    debug!(target: "oem.ingest", "UDP receiver stopped");
}

/// 接收出错后等待 [`RECV_ERROR_BACKOFF`]；期间收到停止信号返回 `true`。
async fn pause_after_error(stop_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = stop_rx.changed() => true,
        _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => false,
    }
}

async fn handle_datagram(data: &[u8], handler: &dyn FrameHandler) -> Result<(), IngestError> {
    let frame = parse_datagram(data)?;
    debug!(
        target: "oem.ingest",
        node_id = frame.node_id,
        tokens = frame.tokens.len(),
        received_at_ms = frame.received_at_ms,
        "Received data"
    );
    handler.handle(frame).await
}

/// 解析 ASCII 报文：`<node_id> <byte> <byte> ...`，末尾最多两个 CR/LF 会被去掉。
pub fn parse_datagram(data: &[u8]) -> Result<RawFrame, IngestError> {
    if !data.is_ascii() {
        return Err(IngestError::InvalidFrame(
            "datagram is not ascii".to_string(),
        ));
    }
    let text = std::str::from_utf8(data)
        .map_err(|err| IngestError::InvalidFrame(err.to_string()))?;
    let text = remove_line_breaks(text);

    let mut tokens = text.split_whitespace();
    let node_token = tokens
        .next()
        .ok_or_else(|| IngestError::InvalidFrame("missing node id".to_string()))?;
    let node_id = node_token
        .parse::<NodeId>()
        .map_err(|_| IngestError::InvalidFrame(format!("invalid node id '{}'", node_token)))?;

    Ok(RawFrame {
        node_id,
        tokens: tokens.map(str::to_string).collect(),
        received_at_ms: now_epoch_ms(),
    })
}

fn remove_line_breaks(text: &str) -> &str {
    let mut text = text;
    for _ in 0..2 {
        text = text
            .strip_suffix('\n')
            .or_else(|| text.strip_suffix('\r'))
            .unwrap_or(text);
    }
    text
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
