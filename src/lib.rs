// src/lib.rs
//
// linetap — serial telemetry capture.
//
// Pipeline: raw bytes -> LineFramer -> CaptureGate -> BoundedRelay ->
// SessionSink (-> LogRecord extraction) -> output file. One reader thread
// owns the transport; the session loop drains the relay; the relay's bound
// is the only flow control.

pub mod logging;

pub mod config;
pub mod framer;
pub mod gate;
pub mod port;
pub mod reader;
pub mod record;
pub mod relay;
pub mod session;

pub use config::{CaptureConfig, PersistMode};
pub use framer::LineFramer;
pub use gate::CaptureGate;
pub use port::{list_ports, open_port, Parity, SerialSettings};
pub use reader::{run_reader, CapturePipeline, LineHandler};
pub use record::{parse_record, LogRecord, ParseError};
pub use relay::{bounded, Dequeued, RelayConsumer, RelayProducer};
pub use session::{run_capture, SessionOutcome, SessionSink};
