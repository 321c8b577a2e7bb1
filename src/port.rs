// src/port.rs
//
// Serial transport setup and conversions for the serialport crate.
// The capture core only needs "read available bytes" and "write bytes";
// everything here is thin configuration plumbing around opening a port.

use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, SerialPort, StopBits};

use crate::framer::encode_line;

/// Read timeout on the open port. Short so the reader thread observes its
/// cancel flag promptly; timeouts are expected and ignored by the loop.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

// ============================================================================
// Settings
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Parity::None),
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            other => Err(format!("invalid parity '{}' (none, odd, even)", other)),
        }
    }
}

/// Serial connection settings, supplied by the CLI/config layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
}

fn default_baud_rate() -> u32 {
    115_200
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            port: String::new(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert our Parity enum to serialport crate's Parity type
pub fn to_serialport_parity(p: &Parity) -> SpParity {
    match p {
        Parity::None => SpParity::None,
        Parity::Odd => SpParity::Odd,
        Parity::Even => SpParity::Even,
    }
}

/// Convert data bits count to serialport crate's DataBits type
pub fn to_serialport_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

/// Convert stop bits count to serialport crate's StopBits type
pub fn to_serialport_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

// ============================================================================
// Port Access
// ============================================================================

/// Open the configured serial port for a capture session.
pub fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>, String> {
    if settings.port.is_empty() {
        return Err("no serial port specified".to_string());
    }

    serialport::new(&settings.port, settings.baud_rate)
        .data_bits(to_serialport_data_bits(settings.data_bits))
        .stop_bits(to_serialport_stop_bits(settings.stop_bits))
        .parity(to_serialport_parity(&settings.parity))
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| format!("Failed to open {}: {}", settings.port, e))
}

/// Write one text line to the transport, terminator appended, and flush.
pub fn write_line<W: Write>(writer: &mut W, text: &str, terminator: &[u8]) -> Result<(), String> {
    writer
        .write_all(&encode_line(text, terminator))
        .and_then(|_| writer.flush())
        .map_err(|e| format!("Serial write error: {}", e))
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List available serial ports
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections; the tty devices block on open waiting for carrier detect.
pub fn list_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}
