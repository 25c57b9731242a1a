// src/serial/mod.rs - Link protocol engine: connection ownership, stop-and-wait
// command discipline, continuous inbound classification.
pub mod protocol;
pub mod transport;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::serial::protocol::TempParser;
use crate::serial::transport::{LinkTransport, SerialTransport};

/// How long the reader sleeps when the device had nothing to say.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Inbound lines buffered per observer before the oldest are dropped.
const LINE_CHANNEL_CAPACITY: usize = 256;
/// How long disconnect waits for the reader task before aborting it.
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("serial port is not connected")]
    NotConnected,
    #[error("serial write failed: {0}")]
    Write(#[source] io::Error),
    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),
}

/// Last-observed state of the physical link.
#[derive(Debug, Clone, Default)]
pub struct LinkState {
    pub connected: bool,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub hotend_c: Option<f32>,
    pub bed_c: Option<f32>,
}

struct ReaderHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

struct LinkInner {
    transport: RwLock<Option<Arc<dyn LinkTransport>>>,
    state: RwLock<LinkState>,
    /// One command in flight across the whole engine.
    cmd_lock: Mutex<()>,
    /// The single outstanding acknowledgment wait, resolved by the reader.
    pending_ack: Mutex<Option<oneshot::Sender<()>>>,
    lines_tx: broadcast::Sender<String>,
    reader: Mutex<Option<ReaderHandle>>,
    temp_parser: TempParser,
}

/// Owns the physical connection and provides ordered, timeout-bounded command
/// delivery with acknowledgment detection. Cheap to clone; all clones share
/// the same connection.
#[derive(Clone)]
pub struct SerialLink {
    inner: Arc<LinkInner>,
}

impl SerialLink {
    pub fn new() -> Self {
        let (lines_tx, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(LinkInner {
                transport: RwLock::new(None),
                state: RwLock::new(LinkState::default()),
                cmd_lock: Mutex::new(()),
                pending_ack: Mutex::new(None),
                lines_tx,
                reader: Mutex::new(None),
                temp_parser: TempParser::new(),
            }),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.transport.read().await.is_some()
    }

    pub async fn state(&self) -> LinkState {
        self.inner.state.read().await.clone()
    }

    /// Every non-empty inbound line, verbatim, in arrival order. A lagging
    /// observer loses the oldest lines; the reader never waits for it.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.inner.lines_tx.subscribe()
    }

    /// Open the port and start the reader. No-op when already connected.
    pub async fn connect(&self, port: &str, baud: u32) -> Result<(), LinkError> {
        let mut slot = self.inner.transport.write().await;
        if slot.is_some() {
            return Ok(());
        }
        let transport = SerialTransport::open(port, baud).map_err(|source| LinkError::Open {
            port: port.to_string(),
            source,
        })?;
        let transport: Arc<dyn LinkTransport> = Arc::new(transport);
        *slot = Some(transport.clone());
        drop(slot);
        self.start_reader(transport, port, baud).await;
        Ok(())
    }

    /// Same as `connect`, but over a caller-provided transport (simulated
    /// device, tests, alternative byte links).
    pub async fn connect_with(&self, transport: Arc<dyn LinkTransport>, port: &str, baud: u32) {
        let mut slot = self.inner.transport.write().await;
        if slot.is_some() {
            return;
        }
        *slot = Some(transport.clone());
        drop(slot);
        self.start_reader(transport, port, baud).await;
    }

    async fn start_reader(&self, transport: Arc<dyn LinkTransport>, port: &str, baud: u32) {
        {
            let mut state = self.inner.state.write().await;
            *state = LinkState {
                connected: true,
                port: Some(port.to_string()),
                baud: Some(baud),
                hotend_c: None,
                bed_c: None,
            };
        }
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(reader_loop(self.inner.clone(), transport, shutdown_rx));
        *self.inner.reader.lock().await = Some(ReaderHandle { shutdown_tx, task });
        tracing::info!(port, baud, "serial link connected");
    }

    /// Stop the reader, close the port, reset temperature state. Best-effort:
    /// always succeeds, safe to call repeatedly.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.inner.reader.lock().await.take() {
            let _ = handle.shutdown_tx.send(());
            let mut task = handle.task;
            if timeout(READER_JOIN_TIMEOUT, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.inner.transport.write().await.take();
        // Anyone parked in send_and_await_ack observes the closed channel.
        self.inner.pending_ack.lock().await.take();
        *self.inner.state.write().await = LinkState::default();
        tracing::info!("serial link disconnected");
    }

    /// Write one newline-terminated line without waiting for acknowledgment.
    pub async fn send(&self, line: &str) -> Result<(), LinkError> {
        let _guard = self.inner.cmd_lock.lock().await;
        self.write_line(line).await
    }

    /// Write one line, then suspend until the reader classifies an
    /// acknowledgment or the deadline passes. Commands are strictly
    /// serialized: a second caller waits for the first to resolve.
    pub async fn send_and_await_ack(
        &self,
        line: &str,
        ack_timeout: Duration,
    ) -> Result<(), LinkError> {
        let _guard = self.inner.cmd_lock.lock().await;
        let (ack_tx, ack_rx) = oneshot::channel();
        *self.inner.pending_ack.lock().await = Some(ack_tx);
        if let Err(e) = self.write_line(line).await {
            self.inner.pending_ack.lock().await.take();
            return Err(e);
        }
        match timeout(ack_timeout, ack_rx).await {
            Ok(Ok(())) => Ok(()),
            // Sender dropped: the link was torn down mid-wait.
            Ok(Err(_)) => Err(LinkError::NotConnected),
            Err(_) => {
                self.inner.pending_ack.lock().await.take();
                Err(LinkError::AckTimeout(ack_timeout))
            }
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), LinkError> {
        let transport = self
            .inner
            .transport
            .read()
            .await
            .clone()
            .ok_or(LinkError::NotConnected)?;
        let line = line.trim();
        let mut data = line.to_string();
        data.push('\n');
        tracing::debug!(command = line, "serial TX");
        if let Err(e) = transport.write_all(data.as_bytes()).await {
            tracing::warn!("serial write failed, closing link: {e}");
            self.disconnect().await;
            return Err(LinkError::Write(e));
        }
        Ok(())
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").finish_non_exhaustive()
    }
}

/// Strip undecodable bytes instead of failing: firmware noise during resets
/// must never kill the reader.
fn decode_lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect()
}

async fn reader_loop(
    inner: Arc<LinkInner>,
    transport: Arc<dyn LinkTransport>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            read = transport.read(&mut buf) => match read {
                Ok(0) => tokio::time::sleep(READ_POLL_INTERVAL).await,
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                        let raw: Vec<u8> = pending.drain(..=pos).collect();
                        let line = decode_lossy(&raw);
                        let line = line.trim();
                        if !line.is_empty() {
                            handle_line(&inner, line).await;
                        }
                    }
                }
                Err(e) => {
                    // Transient device hiccup: no data this cycle, not fatal.
                    tracing::trace!("serial read error (ignored): {e}");
                    tokio::time::sleep(READ_POLL_INTERVAL).await;
                }
            }
        }
    }
}

async fn handle_line(inner: &LinkInner, line: &str) {
    tracing::debug!(line, "serial RX");
    // Observers first, verbatim; result deliberately ignored.
    let _ = inner.lines_tx.send(line.to_string());

    if protocol::is_ack(line) {
        if let Some(ack_tx) = inner.pending_ack.lock().await.take() {
            let _ = ack_tx.send(());
        }
        return;
    }

    if let Some(reading) = inner.temp_parser.parse(line) {
        let mut state = inner.state.write().await;
        state.hotend_c = Some(reading.hotend_c);
        if let Some(bed) = reading.bed_c {
            state.bed_c = Some(bed);
        }
    }
}
