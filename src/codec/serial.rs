//! Serial port plumbing for the radio's programming cable.
use anyhow::{Context, Result};
use log::info;
use serialport::{SerialPort, SerialPortType};

use crate::settings::SerialSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    pub device: String,
    pub description: String,
}

/// Opens the configured port. Reads block for at most the configured timeout,
/// which is what lets the reader notice cancellation promptly.
pub fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    let path = settings
        .port
        .as_deref()
        .context("no serial port configured")?;

    let port = serialport::new(path, settings.baud_rate)
        .timeout(settings.read_timeout())
        .open()
        .with_context(|| format!("failed to open serial port '{path}'"))?;

    info!("Opened {path} at {} baud", settings.baud_rate);
    Ok(port)
}

/// USB serial adapters visible to the system. Ports without a USB vendor id
/// (built-in UARTs, Bluetooth) are skipped.
pub fn list_usb_ports() -> Result<Vec<PortDescription>> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;

    Ok(ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => {
                let description = [usb.product, usb.manufacturer]
                    .into_iter()
                    .flatten()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" - ");
                Some(PortDescription {
                    device: port.port_name,
                    description: if description.is_empty() {
                        "Unknown".into()
                    } else {
                        description
                    },
                })
            }
            _ => None,
        })
        .collect())
}
