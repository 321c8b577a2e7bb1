// src/reader.rs
//
// Reader task: owns the transport, runs the framer and the capture gate,
// and enqueues accepted lines into the relay. Blocking I/O on a dedicated
// thread with an AtomicBool cancel flag, checked every loop iteration.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::framer::LineFramer;
use crate::gate::CaptureGate;
use crate::relay::RelayProducer;

/// Transport lifecycle callbacks, invoked by the read loop.
///
/// The capture pipeline implements these three operations; any transport
/// read loop can drive them.
pub trait LineHandler {
    /// Transport is open and the loop is about to start reading.
    fn on_connect(&mut self);
    /// One decoded line. Return `false` to stop the read loop (the
    /// downstream side is gone).
    fn on_line(&mut self, line: String) -> bool;
    /// Transport closed or failed; `reason` is human-readable.
    fn on_disconnect(&mut self, reason: &str);
}

/// Gate + relay pipeline behind the read loop.
/// Owns the producer handle; dropping it (when the reader thread exits)
/// closes the relay and wakes the sink.
pub struct CapturePipeline {
    gate: CaptureGate,
    producer: RelayProducer,
}

impl CapturePipeline {
    pub fn new(gate: CaptureGate, producer: RelayProducer) -> Self {
        CapturePipeline { gate, producer }
    }
}

impl LineHandler for CapturePipeline {
    fn on_connect(&mut self) {
        crate::tlog!("port opened");
    }

    fn on_line(&mut self, line: String) -> bool {
        if !self.gate.accept(&line) {
            return true;
        }
        // Blocks while the relay is full: backpressure into this loop.
        // Fails only when the session is gone, which stops the reader.
        self.producer.enqueue(line).is_ok()
    }

    fn on_disconnect(&mut self, reason: &str) {
        crate::tlog!("connection lost: {}", reason);
    }
}

/// Blocking read loop over any byte source.
///
/// Reads chunks, feeds them through the framer, and hands each decoded
/// line to the handler. `Ok(0)` is end-of-stream; timeouts are expected
/// (the serial port is opened with a short read timeout so the cancel
/// flag is observed promptly) and ignored. Any other error ends the
/// stream with its reason. On exit a trailing unterminated line, if any,
/// is flushed through the handler before `on_disconnect`.
pub fn run_reader<R: Read, H: LineHandler>(
    mut source: R,
    framer: &mut LineFramer,
    handler: &mut H,
    cancel: &AtomicBool,
) {
    handler.on_connect();

    let mut buf = [0u8; 256];
    let reason: String = 'read: loop {
        if cancel.load(Ordering::Relaxed) {
            break 'read "stopped".to_string();
        }

        match source.read(&mut buf) {
            Ok(0) => break 'read "disconnected".to_string(),
            Ok(n) => {
                for line in framer.feed(&buf[..n]) {
                    if !handler.on_line(line) {
                        break 'read "session closed".to_string();
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                // Expected for serial reads with a short timeout
            }
            Err(e) => break 'read format!("read error: {}", e),
        }
    };

    // Deliver a trailing partial line before reporting the disconnect
    if let Some(line) = framer.flush() {
        let _ = handler.on_line(line);
    }
    handler.on_disconnect(&reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{bounded, Dequeued};
    use std::io::Cursor;
    use std::sync::atomic::AtomicBool;

    /// Records every callback for assertions on ordering and payloads.
    struct RecordingHandler {
        events: Vec<String>,
        stop_after: Option<usize>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            RecordingHandler {
                events: Vec::new(),
                stop_after: None,
            }
        }
    }

    impl LineHandler for RecordingHandler {
        fn on_connect(&mut self) {
            self.events.push("connect".to_string());
        }

        fn on_line(&mut self, line: String) -> bool {
            self.events.push(format!("line:{}", line));
            match self.stop_after {
                Some(n) => self.events.iter().filter(|e| e.starts_with("line:")).count() < n,
                None => true,
            }
        }

        fn on_disconnect(&mut self, reason: &str) {
            self.events.push(format!("disconnect:{}", reason));
        }
    }

    #[test]
    fn test_callback_order_and_eof_reason() {
        let source = Cursor::new(b"one\r\ntwo\r\n".to_vec());
        let mut framer = LineFramer::default();
        let mut handler = RecordingHandler::new();
        let cancel = AtomicBool::new(false);

        run_reader(source, &mut framer, &mut handler, &cancel);

        assert_eq!(
            handler.events,
            vec![
                "connect".to_string(),
                "line:one".to_string(),
                "line:two".to_string(),
                "disconnect:disconnected".to_string(),
            ]
        );
    }

    #[test]
    fn test_trailing_partial_line_is_flushed() {
        let source = Cursor::new(b"done\r\npartial".to_vec());
        let mut framer = LineFramer::default();
        let mut handler = RecordingHandler::new();
        let cancel = AtomicBool::new(false);

        run_reader(source, &mut framer, &mut handler, &cancel);

        assert_eq!(
            handler.events,
            vec![
                "connect".to_string(),
                "line:done".to_string(),
                "line:partial".to_string(),
                "disconnect:disconnected".to_string(),
            ]
        );
    }

    #[test]
    fn test_handler_can_stop_the_loop() {
        let source = Cursor::new(b"a\r\nb\r\nc\r\n".to_vec());
        let mut framer = LineFramer::default();
        let mut handler = RecordingHandler::new();
        handler.stop_after = Some(1);
        let cancel = AtomicBool::new(false);

        run_reader(source, &mut framer, &mut handler, &cancel);

        assert_eq!(handler.events[0], "connect");
        assert_eq!(handler.events[1], "line:a");
        assert_eq!(
            handler.events.last().unwrap(),
            "disconnect:session closed"
        );
    }

    #[test]
    fn test_cancel_flag_stops_before_reading() {
        let source = Cursor::new(b"never\r\n".to_vec());
        let mut framer = LineFramer::default();
        let mut handler = RecordingHandler::new();
        let cancel = AtomicBool::new(true);

        run_reader(source, &mut framer, &mut handler, &cancel);

        assert_eq!(
            handler.events,
            vec!["connect".to_string(), "disconnect:stopped".to_string()]
        );
    }

    #[test]
    fn test_pipeline_gates_and_enqueues() {
        let (producer, consumer) = bounded(8);
        let gate = CaptureGate::new("app_main");
        let mut pipeline = CapturePipeline::new(gate, producer);
        let mut framer = LineFramer::default();
        let cancel = AtomicBool::new(false);

        let source = Cursor::new(b"noise\r\napp_main\r\nline1\r\n".to_vec());
        run_reader(source, &mut framer, &mut pipeline, &cancel);
        drop(pipeline); // closes the relay

        assert_eq!(consumer.dequeue(), Dequeued::Line("app_main".to_string()));
        assert_eq!(consumer.dequeue(), Dequeued::Line("line1".to_string()));
        assert_eq!(consumer.dequeue(), Dequeued::Closed);
    }
}
