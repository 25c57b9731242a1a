// src/job/mod.rs - Job execution controller: streams a stored command file
// through the link as a pausable, cancellable, fault-tolerant execution.
pub mod gate;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::capture::{CaptureMode, CaptureTrigger};
use crate::gcode::{self, LayerTracker};
use crate::led::{StatusColor, StatusLed};
use crate::serial::SerialLink;
use crate::job::gate::Gate;
use crate::storage::{StorageError, StorageRoot};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("a job is already running")]
    AlreadyRunning,
    #[error("printer is not connected")]
    NotConnected,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Printing,
    Paused,
    Cancelling,
}

/// Snapshot of the current execution. Written line-by-line by the execution
/// task only; control calls commit state transitions and nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: Option<String>,
    pub state: JobState,
    pub filename: Option<String>,
    pub current_line: usize,
    pub total_lines: usize,
    pub progress: f64,
    pub error: Option<String>,
}

impl JobInfo {
    fn idle() -> Self {
        Self {
            id: None,
            state: JobState::Idle,
            filename: None,
            current_line: 0,
            total_lines: 0,
            progress: 0.0,
            error: None,
        }
    }

    fn started(filename: &str) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            state: JobState::Printing,
            filename: Some(filename.to_string()),
            ..Self::idle()
        }
    }

    fn failed(filename: &str, message: String) -> Self {
        Self {
            filename: Some(filename.to_string()),
            error: Some(message),
            ..Self::idle()
        }
    }
}

/// Tunables for one controller instance.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Acknowledgment deadline for ordinary commands.
    pub ack_timeout: Duration,
    /// Acknowledgment deadline for heating-class commands.
    pub heating_ack_timeout: Duration,
    /// How long `cancel` waits for the execution task before forcing a reset.
    pub cancel_grace: Duration,
    pub status_led: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(30),
            heating_ack_timeout: Duration::from_secs(60),
            cancel_grace: Duration::from_secs(2),
            status_led: true,
        }
    }
}

pub struct JobController {
    link: SerialLink,
    storage: StorageRoot,
    options: JobOptions,
    info: Arc<RwLock<JobInfo>>,
    gate: Gate,
    cancel: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    led: StatusLed,
    capture: Option<Arc<dyn CaptureTrigger>>,
    capture_mode: CaptureMode,
}

impl JobController {
    pub fn new(link: SerialLink, storage: StorageRoot, options: JobOptions) -> Self {
        let led = StatusLed::new(link.clone(), options.status_led);
        Self {
            link,
            storage,
            options,
            info: Arc::new(RwLock::new(JobInfo::idle())),
            gate: Gate::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            led,
            capture: None,
            capture_mode: CaptureMode::Disabled,
        }
    }

    /// Wire the optional capture collaborator. Absent trigger or
    /// `CaptureMode::Disabled` simply turns the trigger path off.
    pub fn set_capture(&mut self, trigger: Arc<dyn CaptureTrigger>, mode: CaptureMode) {
        self.capture = Some(trigger);
        self.capture_mode = mode;
    }

    pub async fn info(&self) -> JobInfo {
        self.info.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Validate and launch. Rejects when a job is active, the link is down,
    /// or the filename does not resolve to a regular file inside the
    /// storage root.
    pub async fn start(&self, filename: &str) -> Result<(), JobError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(JobError::AlreadyRunning);
        }
        if !self.link.is_connected().await {
            return Err(JobError::NotConnected);
        }
        let path = self.storage.resolve(filename)?;

        self.cancel.store(false, Ordering::SeqCst);
        self.gate.open();
        *self.info.write().await = JobInfo::started(filename);
        tracing::info!(filename, "job started");

        let worker = JobWorker {
            link: self.link.clone(),
            info: self.info.clone(),
            gate: self.gate.clone(),
            cancel: self.cancel.clone(),
            led: self.led.clone(),
            capture: self.capture.clone(),
            capture_mode: self.capture_mode,
            ack_timeout: self.options.ack_timeout,
            heating_ack_timeout: self.options.heating_ack_timeout,
        };
        let filename = filename.to_string();
        *task = Some(tokio::spawn(async move { worker.run(path, filename).await }));
        drop(task);

        self.led.signal(StatusColor::Printing);
        Ok(())
    }

    /// Suspend before the next command. No-op unless currently printing.
    pub async fn pause(&self) {
        {
            let mut info = self.info.write().await;
            if info.state != JobState::Printing {
                return;
            }
            info.state = JobState::Paused;
        }
        self.gate.close();
        self.led.signal(StatusColor::Paused);
        tracing::info!("job paused");
    }

    /// Resume a paused execution. No-op unless currently paused.
    pub async fn resume(&self) {
        {
            let mut info = self.info.write().await;
            if info.state != JobState::Paused {
                return;
            }
            info.state = JobState::Printing;
        }
        self.gate.open();
        self.led.signal(StatusColor::Printing);
        tracing::info!("job resumed");
    }

    /// Cooperative cancel: flag the execution task, reopen the gate so a
    /// paused task can observe the flag, wait a bounded grace period, then
    /// force-reset state either way.
    pub async fn cancel(&self) {
        {
            let mut info = self.info.write().await;
            if !matches!(info.state, JobState::Printing | JobState::Paused) {
                return;
            }
            info.state = JobState::Cancelling;
        }
        self.cancel.store(true, Ordering::SeqCst);
        self.gate.open();

        if let Some(mut task) = self.task.lock().await.take() {
            if timeout(self.options.cancel_grace, &mut task).await.is_err() {
                tracing::warn!("execution task missed the cancellation grace period, aborting it");
                task.abort();
            }
        }
        *self.info.write().await = JobInfo::idle();
        tracing::info!("job cancelled");
    }
}

/// The execution task body. Owns clones of the shared handles; sole writer
/// of `JobInfo` fields while it runs.
struct JobWorker {
    link: SerialLink,
    info: Arc<RwLock<JobInfo>>,
    gate: Gate,
    cancel: Arc<AtomicBool>,
    led: StatusLed,
    capture: Option<Arc<dyn CaptureTrigger>>,
    capture_mode: CaptureMode,
    ack_timeout: Duration,
    heating_ack_timeout: Duration,
}

impl JobWorker {
    async fn run(self, path: PathBuf, filename: String) {
        let text = match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::error!("failed to read {}: {e}", path.display());
                *self.info.write().await =
                    JobInfo::failed(&filename, format!("failed to read {filename}: {e}"));
                return;
            }
        };
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len().max(1);
        self.info.write().await.total_lines = total;

        let mut tracker = LayerTracker::new();
        for (idx, raw) in lines.iter().enumerate() {
            self.info.write().await.current_line = idx;
            self.gate.wait_open().await;
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            // Layer markers are comments, so look before the comment skip.
            if tracker.observe(raw) {
                self.fire_capture().await;
            }

            let Some(cmd) = gcode::prepare(raw) else {
                self.advance(idx, total).await;
                continue;
            };
            if gcode::is_unsupported(cmd) {
                tracing::debug!(command = cmd, "skipping unsupported command");
                self.advance(idx, total).await;
                continue;
            }

            let deadline = if gcode::is_heating_command(cmd) {
                self.heating_ack_timeout
            } else {
                self.ack_timeout
            };
            if let Err(e) = self.link.send_and_await_ack(cmd, deadline).await {
                tracing::error!(command = cmd, "job aborted: {e}");
                self.led.signal(StatusColor::Error);
                *self.info.write().await =
                    JobInfo::failed(&filename, format!("command '{cmd}' failed: {e}"));
                return;
            }
            self.advance(idx, total).await;
        }

        self.led.signal(StatusColor::Off);
        if self.cancel.load(Ordering::SeqCst) {
            tracing::info!(filename, "job stopped by cancellation");
        } else {
            tracing::info!(filename, "job complete");
        }
        *self.info.write().await = JobInfo::idle();
    }

    async fn advance(&self, idx: usize, total: usize) {
        self.info.write().await.progress = (idx + 1) as f64 / total as f64;
    }

    async fn fire_capture(&self) {
        if self.capture_mode != CaptureMode::PerLayer {
            return;
        }
        let Some(trigger) = &self.capture else {
            return;
        };
        if let Err(e) = trigger.capture_frame().await {
            tracing::debug!("layer capture failed (ignored): {e}");
        }
    }
}
