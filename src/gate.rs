// src/gate.rs
//
// Capture gate: suppresses boot noise until the configured start marker
// appears, then forwards every line for the rest of the session.

/// One-shot latch over the decoded line stream.
///
/// Lines are discarded until one contains the start marker as a substring.
/// The marker line itself is forwarded, and the gate stays open for the
/// lifetime of the instance — it never closes again.
pub struct CaptureGate {
    marker: String,
    streaming: bool,
}

impl CaptureGate {
    pub fn new(marker: impl Into<String>) -> Self {
        CaptureGate {
            marker: marker.into(),
            streaming: false,
        }
    }

    /// Returns `true` when the line should be forwarded downstream.
    pub fn accept(&mut self, line: &str) -> bool {
        if !self.streaming && line.contains(&self.marker) {
            self.streaming = true;
        }
        self.streaming
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "main_task: Calling app_main";

    #[test]
    fn test_suppresses_lines_before_marker() {
        let mut gate = CaptureGate::new(MARKER);

        assert!(!gate.accept("boot noise"));
        assert!(!gate.accept("more noise"));
        assert!(!gate.is_streaming());
    }

    #[test]
    fn test_marker_line_is_forwarded() {
        let mut gate = CaptureGate::new(MARKER);

        assert!(gate.accept("I (310) main_task: Calling app_main"));
        assert!(gate.is_streaming());
    }

    #[test]
    fn test_every_line_forwarded_after_marker() {
        let mut gate = CaptureGate::new(MARKER);

        assert!(!gate.accept("noise"));
        assert!(gate.accept(MARKER));
        assert!(gate.accept("line1"));
        assert!(gate.accept(""));
        // Later marker occurrences change nothing
        assert!(gate.accept(MARKER));
        assert!(gate.accept("line2"));
    }

    #[test]
    fn test_marker_match_is_substring_containment() {
        let mut gate = CaptureGate::new("app_main");

        assert!(!gate.accept("app_mai"));
        assert!(gate.accept("prefix app_main suffix"));
    }
}
