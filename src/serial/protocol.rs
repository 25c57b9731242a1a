// src/serial/protocol.rs - Inbound line classification
use regex::Regex;

/// Acknowledgment token: the device consumed and accepted the last command.
pub const ACK_TOKEN: &str = "ok";

/// A line equal to or prefixed by the acknowledgment token (case-insensitive)
/// resolves the outstanding command wait. Nothing else affects flow control.
pub fn is_ack(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case(ACK_TOKEN)
        || line
            .get(..ACK_TOKEN.len() + 1)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("ok "))
}

/// Temperatures pulled out of a firmware report. Only the current readings
/// are kept; the target halves of each pair are discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempReading {
    pub hotend_c: f32,
    pub bed_c: Option<f32>,
}

/// Matcher for `T:<num>/<num>` optionally followed by `B:<num>/<num>`.
/// Compiled once and reused for every inbound line.
#[derive(Debug)]
pub struct TempParser {
    re: Regex,
}

impl TempParser {
    pub fn new() -> Self {
        let re = Regex::new(
            r"T:\s*([-+]?\d+(?:\.\d+)?)\s*/\s*(?:[-+]?\d+(?:\.\d+)?)?\s*(?:B:\s*([-+]?\d+(?:\.\d+)?)\s*/\s*(?:[-+]?\d+(?:\.\d+)?)?)?",
        )
        .expect("temperature pattern compiles");
        Self { re }
    }

    pub fn parse(&self, line: &str) -> Option<TempReading> {
        let caps = self.re.captures(line)?;
        let hotend_c = caps.get(1)?.as_str().parse::<f32>().ok()?;
        let bed_c = caps.get(2).and_then(|m| m.as_str().parse::<f32>().ok());
        Some(TempReading { hotend_c, bed_c })
    }
}

impl Default for TempParser {
    fn default() -> Self {
        Self::new()
    }
}
