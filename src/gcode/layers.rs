// src/gcode/layers.rs - Layer-change detection for capture triggering
const EPSILON: f64 = 1e-6;

/// Tracks just enough modal state across one execution to guess layer
/// boundaries. Slicer comment markers are authoritative when present;
/// otherwise the first extruding move at a new height counts as a layer.
/// The guess is best-effort: slicer output varies and nothing validates
/// one fire per physical layer.
#[derive(Debug)]
pub struct LayerTracker {
    abs_xyz: bool,
    abs_e: bool,
    z: f64,
    e: f64,
    last_comment_layer: Option<u64>,
    last_fired_z: Option<f64>,
    saw_comment_marker: bool,
}

impl LayerTracker {
    pub fn new() -> Self {
        // G90/M82 are the firmware defaults.
        Self {
            abs_xyz: true,
            abs_e: true,
            z: 0.0,
            e: 0.0,
            last_comment_layer: None,
            last_fired_z: None,
            saw_comment_marker: false,
        }
    }

    /// Feed one raw (untrimmed) file line; true means the line marks the
    /// start of a new layer.
    pub fn observe(&mut self, raw: &str) -> bool {
        let line = raw.trim();
        if let Some(body) = line.strip_prefix(';') {
            return self.observe_comment(body.trim());
        }
        self.observe_command(line)
    }

    fn observe_comment(&mut self, body: &str) -> bool {
        if body == "LAYER_CHANGE" {
            self.saw_comment_marker = true;
            return true;
        }
        if let Some(index) = body.strip_prefix("LAYER:") {
            if let Ok(n) = index.trim().parse::<u64>() {
                self.saw_comment_marker = true;
                let changed = self.last_comment_layer != Some(n);
                self.last_comment_layer = Some(n);
                return changed;
            }
        }
        false
    }

    fn observe_command(&mut self, line: &str) -> bool {
        let cmd = super::strip_comments(line);
        if cmd.is_empty() {
            return false;
        }
        let word = cmd
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match word.as_str() {
            "G90" => {
                self.abs_xyz = true;
                false
            }
            "G91" => {
                self.abs_xyz = false;
                false
            }
            "M82" => {
                self.abs_e = true;
                false
            }
            "M83" => {
                self.abs_e = false;
                false
            }
            "G92" => {
                if let Some(e) = axis_value(cmd, 'E') {
                    self.e = e;
                }
                if let Some(z) = axis_value(cmd, 'Z') {
                    self.z = z;
                }
                false
            }
            "G0" | "G1" => self.observe_move(cmd),
            _ => false,
        }
    }

    fn observe_move(&mut self, cmd: &str) -> bool {
        if let Some(z) = axis_value(cmd, 'Z') {
            self.z = if self.abs_xyz { z } else { self.z + z };
        }
        let mut extruding = false;
        if let Some(e) = axis_value(cmd, 'E') {
            if self.abs_e {
                extruding = e > self.e + EPSILON;
                self.e = e;
            } else {
                extruding = e > EPSILON;
                self.e += e;
            }
        }
        // Comment markers take over for the rest of the file once seen.
        if self.saw_comment_marker || !extruding {
            return false;
        }
        let new_layer = match self.last_fired_z {
            None => true,
            Some(fired) => (self.z - fired).abs() > EPSILON,
        };
        if new_layer {
            self.last_fired_z = Some(self.z);
        }
        new_layer
    }
}

impl Default for LayerTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn axis_value(cmd: &str, axis: char) -> Option<f64> {
    for token in cmd.split_whitespace() {
        if let Some(first) = token.chars().next() {
            if first.eq_ignore_ascii_case(&axis) {
                if let Ok(value) = token[1..].parse::<f64>() {
                    return Some(value);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_index_comment_fires_on_change_only() {
        let mut tracker = LayerTracker::new();
        assert!(tracker.observe(";LAYER:3"));
        assert!(!tracker.observe(";LAYER:3"));
        assert!(tracker.observe(";LAYER:4"));
    }

    #[test]
    fn layer_change_token_always_fires() {
        let mut tracker = LayerTracker::new();
        assert!(tracker.observe(";LAYER_CHANGE"));
        assert!(tracker.observe(";LAYER_CHANGE"));
    }

    #[test]
    fn malformed_layer_comments_are_ignored() {
        let mut tracker = LayerTracker::new();
        assert!(!tracker.observe(";LAYER:abc"));
        assert!(!tracker.observe("; some slicer banner"));
        assert!(!tracker.observe(";LAYER"));
    }

    #[test]
    fn extruding_move_at_new_height_fires() {
        let mut tracker = LayerTracker::new();
        assert!(!tracker.observe("G1 Z0.2 F300"));
        assert!(tracker.observe("G1 X10 Y10 E1.0"));
        // Same layer keeps quiet.
        assert!(!tracker.observe("G1 X20 Y20 E2.0"));
        assert!(!tracker.observe("G1 Z0.4"));
        assert!(tracker.observe("G1 X0 Y0 E3.0"));
    }

    #[test]
    fn z_hop_travel_does_not_fire() {
        let mut tracker = LayerTracker::new();
        tracker.observe("G1 Z0.2");
        assert!(tracker.observe("G1 X1 E1.0"));
        // Hop up, travel, hop back down: no extrusion at the hop height.
        assert!(!tracker.observe("G1 Z0.6"));
        assert!(!tracker.observe("G0 X50 Y50"));
        assert!(!tracker.observe("G1 Z0.2"));
        assert!(!tracker.observe("G1 X51 Y51 E2.0"));
    }

    #[test]
    fn relative_mode_accumulates_height() {
        let mut tracker = LayerTracker::new();
        tracker.observe("G91");
        tracker.observe("M83");
        tracker.observe("G1 Z0.2");
        assert!(tracker.observe("G1 X5 E0.5"));
        tracker.observe("G1 Z0.2");
        assert!(tracker.observe("G1 X6 E0.5"));
    }

    #[test]
    fn extruder_reset_does_not_look_like_extrusion() {
        let mut tracker = LayerTracker::new();
        tracker.observe("G1 Z0.2");
        assert!(tracker.observe("G1 X1 E100.0"));
        tracker.observe("G92 E0");
        // E5 after the reset is forward motion, not a retract replay.
        tracker.observe("G1 Z0.4");
        assert!(tracker.observe("G1 X2 E5.0"));
    }

    #[test]
    fn comment_markers_disable_motion_heuristic() {
        let mut tracker = LayerTracker::new();
        assert!(tracker.observe(";LAYER:0"));
        tracker.observe("G1 Z0.2");
        assert!(!tracker.observe("G1 X1 E1.0"));
        assert!(tracker.observe(";LAYER:1"));
    }
}
