use crate::config::AcquisitionConfig;
use crate::serial_link::SerialBackend;
use serialport::{SerialPortInfo, SerialPortType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArduinoDevice {
    pub name: String,
    pub port: String,
}

impl ArduinoDevice {
    pub fn new(name: String, port: String) -> Self {
        Self { name, port }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortResolverError {
    #[error("No board from vendor {vendor} found. Please connect the board or specify the port manually")]
    PortNotFound { vendor: String },

    #[error("Could not enumerate serial ports: {0}")]
    Enumeration(#[from] serialport::Error),
}

pub struct PortResolver;

impl PortResolver {
    /// Keep the USB ports whose manufacturer starts with `vendor_prefix`,
    /// in enumeration order.
    pub fn available_devices(ports: &[SerialPortInfo], vendor_prefix: &str) -> Vec<ArduinoDevice> {
        ports
            .iter()
            .filter_map(|port| match &port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let manufacturer = usb.manufacturer.as_deref()?;
                    if !manufacturer.starts_with(vendor_prefix) {
                        return None;
                    }
                    let name = usb
                        .product
                        .clone()
                        .unwrap_or_else(|| manufacturer.to_string());
                    Some(ArduinoDevice::new(name, port.port_name.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Pick the device path to open for `config`.
    ///
    /// An explicit port wins. Otherwise the first enumerated match is used;
    /// with several boards attached the pick depends on host enumeration
    /// order. When nothing matches, the configured fallback path is used
    /// if there is one.
    pub fn resolve<B: SerialBackend>(
        backend: &B,
        config: &AcquisitionConfig,
    ) -> Result<String, PortResolverError> {
        if let Some(port) = &config.port {
            log::debug!("Using configured port {}", port);
            return Ok(port.clone());
        }

        log::debug!("Searching for board from vendor {}", config.vendor_prefix);
        let ports = backend.available_ports()?;
        let devices = Self::available_devices(&ports, &config.vendor_prefix);

        if devices.len() > 1 {
            log::warn!(
                "Found {} matching boards, using the first one at {}",
                devices.len(),
                devices[0].port
            );
        }

        match (devices.into_iter().next(), &config.fallback_port) {
            (Some(device), _) => {
                log::debug!("Found {} at {}", device.name, device.port);
                Ok(device.port)
            }
            (None, Some(fallback)) => {
                log::warn!(
                    "No board from vendor {} found, falling back to {}",
                    config.vendor_prefix,
                    fallback
                );
                Ok(fallback.clone())
            }
            (None, None) => Err(PortResolverError::PortNotFound {
                vendor: config.vendor_prefix.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{usb_port, SimulatedBackend};

    fn bluetooth_port(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::BluetoothPort,
        }
    }

    #[test]
    fn test_prefix_match_is_case_sensitive() {
        let ports = vec![
            usb_port("/dev/ttyUSB0", "FTDI"),
            usb_port("/dev/ttyACM0", "arduino.cc"),
            usb_port("/dev/ttyACM1", "Arduino (www.arduino.cc)"),
            bluetooth_port("/dev/rfcomm0"),
        ];

        let devices = PortResolver::available_devices(&ports, "Arduino");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].port, "/dev/ttyACM1");
    }

    #[test]
    fn test_first_enumerated_match_wins() {
        let backend = SimulatedBackend::new(Vec::new()).with_ports(vec![
            usb_port("/dev/ttyACM3", "Arduino LLC"),
            usb_port("/dev/ttyACM1", "Arduino LLC"),
        ]);

        let port = PortResolver::resolve(&backend, &AcquisitionConfig::default()).unwrap();
        assert_eq!(port, "/dev/ttyACM3");
    }

    #[test]
    fn test_explicit_port_skips_discovery() {
        let backend = SimulatedBackend::new(Vec::new());
        let config = AcquisitionConfig::default().with_port("/dev/cu.usbmodem1301");

        let port = PortResolver::resolve(&backend, &config).unwrap();
        assert_eq!(port, "/dev/cu.usbmodem1301");
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let backend =
            SimulatedBackend::new(Vec::new()).with_ports(vec![usb_port("/dev/ttyUSB0", "FTDI")]);
        let config = AcquisitionConfig::default().with_fallback_port("/dev/ttyACM0");

        let port = PortResolver::resolve(&backend, &config).unwrap();
        assert_eq!(port, "/dev/ttyACM0");
    }

    #[test]
    fn test_port_not_found_without_fallback() {
        let backend = SimulatedBackend::new(Vec::new());

        let result = PortResolver::resolve(&backend, &AcquisitionConfig::default());
        assert!(matches!(
            result,
            Err(PortResolverError::PortNotFound { vendor }) if vendor == "Arduino"
        ));
    }
}
