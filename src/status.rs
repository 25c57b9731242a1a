// src/status.rs - Snapshot surface for external observers
use serde::Serialize;

use crate::job::{JobController, JobState};
use crate::serial::SerialLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// One coherent view of both components, cheap to collect and serialize.
/// Meant for push (websocket) or poll (HTTP) layers living outside this
/// crate.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub connection: ConnectionState,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub hotend_c: Option<f32>,
    pub bed_c: Option<f32>,
    pub job_state: JobState,
    pub job_file: Option<String>,
    pub progress: f64,
    pub current_line: usize,
    pub total_lines: usize,
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub async fn collect(link: &SerialLink, jobs: &JobController) -> Self {
        let link_state = link.state().await;
        let job = jobs.info().await;
        Self {
            connection: if link_state.connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            },
            port: link_state.port,
            baud: link_state.baud,
            hotend_c: link_state.hotend_c,
            bed_c: link_state.bed_c,
            job_state: job.state,
            job_file: job.filename,
            progress: job.progress,
            current_line: job.current_line,
            total_lines: job.total_lines,
            error: job.error,
        }
    }
}
