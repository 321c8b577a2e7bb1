// src/main.rs
//
// linetap CLI: open a serial port, capture the gated telemetry stream to a
// timestamped output file, and report how the session ended.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use linetap::config::{CaptureConfig, PersistMode};
use linetap::port::{self, Parity};
use linetap::session::run_capture;
use linetap::{logging, tlog};

#[derive(Parser)]
#[command(name = "linetap", version, about = "Serial telemetry capture")]
struct Cli {
    /// TOML capture configuration file; CLI flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port, e.g. /dev/ttyUSB0 or COM3
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Data bits (5-8)
    #[arg(long)]
    data_bits: Option<u8>,

    /// Stop bits (1-2)
    #[arg(long)]
    stop_bits: Option<u8>,

    /// Parity: none, odd, even
    #[arg(long)]
    parity: Option<Parity>,

    /// Substring that opens the capture gate
    #[arg(long)]
    start_marker: Option<String>,

    /// Exact line that ends the session
    #[arg(long)]
    end_sentinel: Option<String>,

    /// Bound on in-flight lines between reader and sink
    #[arg(long)]
    capacity: Option<usize>,

    /// Abort the session when no line arrives for this many milliseconds
    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Persistence mode: raw, records, records_and_raw
    #[arg(long)]
    mode: Option<PersistMode>,

    /// Directory for the capture output file (default: current directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output file name prefix
    #[arg(long)]
    output_prefix: Option<String>,

    /// Directory for linetap's own log file; stderr only when unset
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Emit the port list as JSON
    #[arg(long, requires = "list_ports")]
    json: bool,
}

impl Cli {
    /// Fold CLI overrides into the (file-loaded or default) configuration.
    fn apply_to(&self, config: &mut CaptureConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(bits) = self.data_bits {
            config.serial.data_bits = bits;
        }
        if let Some(bits) = self.stop_bits {
            config.serial.stop_bits = bits;
        }
        if let Some(parity) = &self.parity {
            config.serial.parity = parity.clone();
        }
        if let Some(marker) = &self.start_marker {
            config.start_marker = marker.clone();
        }
        if let Some(sentinel) = &self.end_sentinel {
            config.end_sentinel = sentinel.clone();
        }
        if let Some(capacity) = self.capacity {
            config.relay_capacity = capacity;
        }
        if let Some(timeout) = self.idle_timeout_ms {
            config.idle_timeout_ms = Some(timeout);
        }
        if let Some(mode) = &self.mode {
            config.persist_mode = mode.clone();
        }
        if let Some(prefix) = &self.output_prefix {
            config.output_prefix = prefix.clone();
        }
    }
}

fn print_port_list(json: bool) -> Result<(), String> {
    let ports = port::list_ports()?;
    if json {
        let rendered = serde_json::to_string_pretty(&ports)
            .map_err(|e| format!("Failed to render port list: {}", e))?;
        println!("{}", rendered);
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for p in ports {
            let detail = match (&p.manufacturer, &p.product) {
                (Some(m), Some(pr)) => format!(" ({} {})", m, pr),
                (Some(m), None) => format!(" ({})", m),
                (None, Some(pr)) => format!(" ({})", pr),
                (None, None) => String::new(),
            };
            println!("{}  [{}]{}", p.port_name, p.port_type, detail);
        }
    }
    Ok(())
}

fn capture(config: &CaptureConfig, output_dir: &PathBuf) -> Result<(), String> {
    let out_path = output_dir.join(config.output_file_name());
    let port = port::open_port(&config.serial)?;
    let file = std::fs::File::create(&out_path)
        .map_err(|e| format!("Failed to create {}: {}", out_path.display(), e))?;

    tlog!(
        "capturing {} at {} baud -> {}",
        config.serial.port,
        config.serial.baud_rate,
        out_path.display()
    );

    let outcome = run_capture(port, file, config)?;
    tlog!("session ended: {}", outcome);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_ports {
        return match print_port_list(cli.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut config = match &cli.config {
        Some(path) => match CaptureConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => CaptureConfig::default(),
    };
    cli.apply_to(&mut config);

    if let Some(log_dir) = &cli.log_dir {
        if let Err(e) = logging::init_file_logging(log_dir) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let output_dir = cli.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let result = capture(&config, &output_dir);
    if let Err(e) = &result {
        tlog!("capture failed: {}", e);
    }
    logging::stop_file_logging();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
