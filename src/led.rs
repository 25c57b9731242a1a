// src/led.rs - Best-effort status indication over the command link
use crate::serial::SerialLink;

/// Indicator colors for the printer's RGB strip (Marlin M150, R/U/B channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Printing,
    Paused,
    Error,
    Off,
}

impl StatusColor {
    fn rgb(self) -> (i32, i32, i32) {
        match self {
            StatusColor::Printing => (0, 255, 0),
            StatusColor::Paused => (255, 160, 0),
            StatusColor::Error => (255, 0, 0),
            StatusColor::Off => (0, 0, 0),
        }
    }
}

/// Drives the strip through ordinary fire-and-forget commands. Indication
/// must never affect job state, so every failure is logged and dropped.
#[derive(Debug, Clone)]
pub struct StatusLed {
    link: SerialLink,
    enabled: bool,
}

impl StatusLed {
    pub fn new(link: SerialLink, enabled: bool) -> Self {
        Self { link, enabled }
    }

    /// Non-blocking: the write happens on its own task so a slow or wedged
    /// link cannot stall the caller.
    pub fn signal(&self, color: StatusColor) {
        if !self.enabled {
            return;
        }
        let (r, g, b) = color.rgb();
        let command = Self::command(r, g, b);
        let link = self.link.clone();
        tokio::spawn(async move {
            if let Err(e) = link.send(&command).await {
                tracing::debug!("status LED update skipped: {e}");
            }
        });
    }

    fn command(r: i32, g: i32, b: i32) -> String {
        // Out-of-range channel values would make the firmware reject the line.
        format!(
            "M150 R{} U{} B{}",
            r.clamp(0, 255),
            g.clamp(0, 255),
            b.clamp(0, 255)
        )
    }
}
