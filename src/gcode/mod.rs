// src/gcode/mod.rs - Per-line policy for streamed command files
pub mod layers;

pub use self::layers::LayerTracker;

/// Display/progress chatter many firmwares reject outright; never sent.
const UNSUPPORTED: &[&str] = &["M73", "M117", "M118"];

/// Everything from the first `;` onward is a comment.
pub fn strip_comments(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// Reduce a raw file line to a sendable command. `None` means the line is
/// blank or comment-only and should just count toward progress.
pub fn prepare(raw: &str) -> Option<&str> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with(';') {
        return None;
    }
    let line = strip_comments(line);
    if line.is_empty() { None } else { Some(line) }
}

fn first_word(cmd: &str) -> &str {
    cmd.split_whitespace().next().unwrap_or("")
}

/// Case-insensitive match against the fixed skip set.
pub fn is_unsupported(cmd: &str) -> bool {
    let word = first_word(cmd);
    UNSUPPORTED.iter().any(|m| word.eq_ignore_ascii_case(m))
}

/// Heater and fan commands can legitimately sit for a long while before the
/// firmware acknowledges; they get the extended deadline. Covers set/wait
/// hotend (M104/M109), the fan commands sharing that prefix (M106/M107), and
/// set/wait bed (M140/M190).
pub fn is_heating_command(cmd: &str) -> bool {
    let word = first_word(cmd).to_ascii_uppercase();
    word.starts_with("M10") || word == "M140" || word == "M190"
}
