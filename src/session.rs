// src/session.rs
//
// Session sink and session lifecycle. The sink drains the relay, persists
// forwarded lines, and decides how the session ends; run_capture wires the
// reader thread and the sink together around one relay.

use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::{CaptureConfig, PersistMode};
use crate::framer::LineFramer;
use crate::gate::CaptureGate;
use crate::reader::{run_reader, CapturePipeline};
use crate::record::parse_record;
use crate::relay::{self, Dequeued, RelayConsumer};

/// Terminal state of a capture session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The end-of-session sentinel line arrived.
    CompletedNormally,
    /// The transport closed without ever delivering the sentinel.
    SourceClosed,
    /// The session gave up, e.g. on idle timeout.
    Aborted(String),
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::CompletedNormally => write!(f, "completed normally"),
            SessionOutcome::SourceClosed => write!(f, "source closed"),
            SessionOutcome::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Consumer loop: dequeues lines and persists them until the sentinel,
/// producer closure, or an idle timeout ends the session.
pub struct SessionSink {
    end_sentinel: String,
    persist_mode: PersistMode,
    record_delimiter: String,
    terminator: String,
    idle_timeout: Option<std::time::Duration>,
    lines_persisted: u64,
}

impl SessionSink {
    pub fn new(config: &CaptureConfig) -> Self {
        SessionSink {
            end_sentinel: config.end_sentinel.clone(),
            persist_mode: config.persist_mode.clone(),
            record_delimiter: config.record_delimiter.clone(),
            terminator: config.line_terminator.clone(),
            idle_timeout: config.idle_timeout(),
            lines_persisted: 0,
        }
    }

    /// Number of lines written so far; carried in write-error context.
    pub fn lines_persisted(&self) -> u64 {
        self.lines_persisted
    }

    /// Drain the relay into `out`. The writer is flushed on every exit
    /// path — normal completion, producer closure, idle timeout, and
    /// write errors — so a partially written file is never left unflushed.
    pub fn run<W: Write>(&mut self, consumer: RelayConsumer, out: W) -> Result<SessionOutcome, String> {
        let mut writer = BufWriter::new(out);
        let outcome = self.drain(&consumer, &mut writer);
        let flushed = writer.flush().map_err(|e| {
            format!(
                "Flush failed after {} persisted lines: {}",
                self.lines_persisted, e
            )
        });
        match (outcome, flushed) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(outcome), Ok(())) => Ok(outcome),
        }
    }

    fn drain<W: Write>(
        &mut self,
        consumer: &RelayConsumer,
        writer: &mut BufWriter<W>,
    ) -> Result<SessionOutcome, String> {
        loop {
            let dequeued = match self.idle_timeout {
                Some(timeout) => consumer.dequeue_timeout(timeout),
                None => consumer.dequeue(),
            };
            let line = match dequeued {
                Dequeued::Line(line) => line,
                Dequeued::Closed => return Ok(SessionOutcome::SourceClosed),
                Dequeued::TimedOut => {
                    return Ok(SessionOutcome::Aborted("idle timeout".to_string()))
                }
            };

            // Sentinel comparison is by value; the sentinel is not persisted.
            if line == self.end_sentinel {
                return Ok(SessionOutcome::CompletedNormally);
            }

            crate::tlog!("{}", line);
            self.persist(&line, writer)?;
        }
    }

    fn persist<W: Write>(&mut self, line: &str, writer: &mut BufWriter<W>) -> Result<(), String> {
        match self.persist_mode {
            PersistMode::RawLines => {
                self.write_unit(line, writer)?;
            }
            PersistMode::Records => {
                // A parse failure falls back to the raw line; never fatal
                match parse_record(line) {
                    Ok(record) => {
                        let rendered = record.to_delimited(&self.record_delimiter);
                        self.write_unit(&rendered, writer)?;
                    }
                    Err(_) => self.write_unit(line, writer)?,
                }
            }
            PersistMode::RecordsAndRaw => {
                self.write_unit(line, writer)?;
                if let Ok(record) = parse_record(line) {
                    let rendered = record.to_delimited(&self.record_delimiter);
                    self.write_unit(&rendered, writer)?;
                }
            }
        }
        Ok(())
    }

    fn write_unit<W: Write>(&mut self, text: &str, writer: &mut BufWriter<W>) -> Result<(), String> {
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.write_all(self.terminator.as_bytes()))
            .map_err(|e| {
                format!(
                    "Write failed after {} persisted lines: {}",
                    self.lines_persisted, e
                )
            })?;
        self.lines_persisted += 1;
        Ok(())
    }
}

/// Run one capture session: a reader thread feeding the relay, drained by
/// the sink on the calling thread. Returns when the session ends; the
/// reader thread is cancelled and joined before returning.
pub fn run_capture<R, W>(source: R, out: W, config: &CaptureConfig) -> Result<SessionOutcome, String>
where
    R: std::io::Read + Send + 'static,
    W: Write,
{
    let (producer, consumer) = relay::bounded(config.relay_capacity);
    let cancel = Arc::new(AtomicBool::new(false));

    let gate = CaptureGate::new(config.start_marker.clone());
    let mut framer = LineFramer::new(config.line_terminator.as_bytes(), config.max_line_length);

    let reader_cancel = cancel.clone();
    let reader = thread::Builder::new()
        .name("serial-reader".to_string())
        .spawn(move || {
            let mut pipeline = CapturePipeline::new(gate, producer);
            run_reader(source, &mut framer, &mut pipeline, &reader_cancel);
        })
        .map_err(|e| format!("Failed to spawn reader thread: {}", e))?;

    let mut sink = SessionSink::new(config);
    // The consumer is dropped inside run(); that closes the relay and
    // unblocks a reader stuck in enqueue.
    let outcome = sink.run(consumer, out);

    cancel.store(true, Ordering::Relaxed);
    let _ = reader.join();

    outcome
}
