// src/sim/mod.rs - In-memory device double for protocol and controller tests
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::serial::transport::LinkTransport;

/// Simulated firmware at the far end of the link. Acknowledges every command
/// with `ok` (optionally delayed), answers `M105` with a temperature report,
/// and can be told to go silent or to fail writes so the failure paths can
/// be exercised without hardware.
#[derive(Clone)]
pub struct SimPrinter {
    inner: Arc<SimInner>,
}

struct SimInner {
    /// Bytes queued for the host to read.
    inbound: Mutex<VecDeque<u8>>,
    data_ready: Notify,
    /// Partial line accumulated from host writes.
    wbuf: Mutex<Vec<u8>>,
    received: Mutex<Vec<String>>,
    silent: AtomicBool,
    fail_writes: AtomicBool,
    ack_delay_ms: AtomicU64,
}

impl SimPrinter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SimInner {
                inbound: Mutex::new(VecDeque::new()),
                data_ready: Notify::new(),
                wbuf: Mutex::new(Vec::new()),
                received: Mutex::new(Vec::new()),
                silent: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                ack_delay_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Stop acknowledging. Commands are still recorded.
    pub fn set_silent(&self, silent: bool) {
        self.inner.silent.store(silent, Ordering::SeqCst);
    }

    /// Make every subsequent host write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay between receiving a command and emitting its `ok`.
    pub fn set_ack_delay(&self, delay: Duration) {
        self.inner
            .ack_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every command line the host has sent, in order.
    pub async fn received_commands(&self) -> Vec<String> {
        self.inner.received.lock().await.clone()
    }

    /// Queue a raw line for the host as if the firmware had emitted it.
    pub async fn inject_line(&self, line: &str) {
        Self::push_line(&self.inner, line).await;
    }

    async fn push_line(inner: &SimInner, line: &str) {
        let mut queue = inner.inbound.lock().await;
        queue.extend(line.as_bytes());
        queue.push_back(b'\n');
        drop(queue);
        inner.data_ready.notify_one();
    }

    async fn handle_command(inner: &Arc<SimInner>, line: String) {
        inner.received.lock().await.push(line.clone());
        if inner.silent.load(Ordering::SeqCst) {
            return;
        }
        let reply = if line.to_ascii_uppercase().starts_with("M105") {
            "ok T:205.0 /210.0 B:60.2 /60.0".to_string()
        } else {
            "ok".to_string()
        };
        let delay = inner.ack_delay_ms.load(Ordering::SeqCst);
        if delay == 0 {
            Self::push_line(inner, &reply).await;
        } else {
            let inner = inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Self::push_line(&inner, &reply).await;
            });
        }
    }
}

impl Default for SimPrinter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkTransport for SimPrinter {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            {
                let mut queue = self.inner.inbound.lock().await;
                if !queue.is_empty() {
                    let n = buf.len().min(queue.len());
                    for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            self.inner.data_ready.notified().await;
        }
    }

    async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write failure",
            ));
        }
        let mut lines = Vec::new();
        {
            let mut wbuf = self.inner.wbuf.lock().await;
            wbuf.extend_from_slice(buf);
            while let Some(pos) = wbuf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = wbuf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    lines.push(line);
                }
            }
        }
        for line in lines {
            Self::handle_command(&self.inner, line).await;
        }
        Ok(())
    }
}
