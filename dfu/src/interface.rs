use std::fmt;

use crate::descriptor::DfuDescriptor;
use crate::quirks::Quirks;

/// A DFU interface / alternate setting of a matched device
///
/// Produced by a [DeviceEnumerator](crate::DeviceEnumerator), read-only
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfuInterface {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) serial: Option<String>,
    pub(crate) bus_id: String,
    pub(crate) port_chain: Vec<u8>,
    pub(crate) device_address: u8,
    pub(crate) dfu_mode: bool,
    pub(crate) config: u8,
    pub(crate) interface: u8,
    pub(crate) alt_setting: u8,
    pub(crate) alt_name: Option<String>,
    pub(crate) max_packet_size: u8,
    pub(crate) descriptor: DfuDescriptor,
    pub(crate) quirks: Quirks,
}

impl DfuInterface {
    /// Interface record for a device identified by vendor / product ids,
    /// remaining fields are filled in with the `with_*` setters.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        DfuInterface {
            vendor_id,
            product_id,
            serial: None,
            bus_id: String::new(),
            port_chain: Vec::new(),
            device_address: 0,
            dfu_mode: true,
            config: 1,
            interface: 0,
            alt_setting: 0,
            alt_name: None,
            max_packet_size: 64,
            descriptor: DfuDescriptor::default(),
            quirks: Quirks::for_device(vendor_id, product_id),
        }
    }

    pub fn with_interface(mut self, interface: u8, alt_setting: u8) -> Self {
        self.interface = interface;
        self.alt_setting = alt_setting;
        self
    }

    pub fn with_descriptor(mut self, descriptor: DfuDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_max_packet_size(mut self, max_packet_size: u8) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }
    pub fn product_id(&self) -> u16 {
        self.product_id
    }
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }
    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }
    pub fn device_address(&self) -> u8 {
        self.device_address
    }
    /// `BUS-PORT.PORT...` path of the device
    pub fn path(&self) -> String {
        let ports: Vec<String> =
            self.port_chain.iter().map(|p| p.to_string()).collect();
        format!("{}-{}", self.bus_id, ports.join("."))
    }
    /// Interface protocol 2 (DFU mode) rather than 1 (runtime)
    pub fn is_dfu_mode(&self) -> bool {
        self.dfu_mode
    }
    pub fn config(&self) -> u8 {
        self.config
    }
    pub fn interface(&self) -> u8 {
        self.interface
    }
    pub fn alt_setting(&self) -> u8 {
        self.alt_setting
    }
    pub fn alt_name(&self) -> Option<&str> {
        self.alt_name.as_deref()
    }
    /// `bMaxPacketSize0` of the control endpoint
    pub fn max_packet_size(&self) -> u8 {
        self.max_packet_size
    }
    pub fn descriptor(&self) -> &DfuDescriptor {
        &self.descriptor
    }
    pub fn quirks(&self) -> Quirks {
        self.quirks
    }
}

impl fmt::Display for DfuInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:04x}:{:04x}] ver={:04x}, devnum={}, cfg={}, intf={}, \
             path=\"{}\", alt={}, name=\"{}\", serial=\"{}\"",
            self.vendor_id,
            self.product_id,
            self.descriptor.dfu_version(),
            self.device_address,
            self.config,
            self.interface,
            self.path(),
            self.alt_setting,
            self.alt_name.as_deref().unwrap_or("UNKNOWN"),
            self.serial.as_deref().unwrap_or("UNKNOWN"),
        )
    }
}
