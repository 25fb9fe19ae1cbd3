use std::{num::NonZeroU8, time::Duration};

use log::{debug, warn};
use nusb::{self, MaybeFuture};

use crate::{
    DfuDescriptor, DfuInterface, MatchCriteria, Quirks, TransportError,
    request::ControlTransport,
};

const DFU_CLASS: u8 = 0xFE;
const DFU_SUBCLASS: u8 = 0x1;
const DFU_PROTOCOL_DFU_MODE: u8 = 0x2;

/// Source of DFU interfaces and the handles to talk to them
pub trait DeviceEnumerator {
    type Handle: ControlTransport;

    /// Every DFU interface matching `criteria`
    fn find(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<DfuInterface>, TransportError>;

    /// Open the device, claim the interface and select its alternate setting
    fn open(&self, intf: &DfuInterface) -> Result<Self::Handle, TransportError>;
}

/// [DeviceEnumerator] over the USB devices visible to `nusb`
#[derive(Clone, Debug)]
pub struct NusbEnumerator {
    timeout: Duration,
}

impl NusbEnumerator {
    pub fn new(timeout: Duration) -> Self {
        NusbEnumerator { timeout }
    }
}

impl Default for NusbEnumerator {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TIMEOUT)
    }
}

impl DeviceEnumerator for NusbEnumerator {
    type Handle = nusb::Interface;

    fn find(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<DfuInterface>, TransportError> {
        let devices: Vec<nusb::DeviceInfo> = nusb::list_devices()
            .wait()?
            .filter(is_dfu_device)
            .filter(|dev| {
                criteria.may_match_ids(dev.vendor_id(), dev.product_id())
            })
            .collect();

        let mut found = Vec::new();
        for device in devices {
            match dfu_interfaces(&device, self.timeout) {
                Ok(interfaces) => found.extend(
                    interfaces
                        .into_iter()
                        .filter(|intf| criteria.matches(intf)),
                ),
                Err(err) => warn!(
                    "Cannot open DFU device {:04x}:{:04x}: {err}",
                    device.vendor_id(),
                    device.product_id()
                ),
            }
        }
        Ok(found)
    }

    fn open(
        &self,
        intf: &DfuInterface,
    ) -> Result<nusb::Interface, TransportError> {
        let info = nusb::list_devices()
            .wait()?
            .find(|dev| {
                dev.bus_id() == intf.bus_id()
                    && dev.device_address() == intf.device_address()
            })
            .ok_or_else(|| TransportError::Gone(intf.path()))?;
        debug!("Opening {intf}");
        let dev = info.open().wait()?;
        let interface = dev.claim_interface(intf.interface()).wait()?;
        interface.set_alt_setting(intf.alt_setting()).wait()?;
        Ok(interface)
    }
}

/// List DFU interfaces of all attached devices matching `criteria`
pub fn find_dfu_devices(
    criteria: &MatchCriteria,
) -> Result<Vec<DfuInterface>, TransportError> {
    NusbEnumerator::default().find(criteria)
}

fn dfu_interfaces(
    device: &nusb::DeviceInfo,
    timeout: Duration,
) -> Result<Vec<DfuInterface>, nusb::Error> {
    let open_dev: nusb::Device = device.open().wait()?;
    let max_packet_size = open_dev.device_descriptor().max_packet_size_0();
    let quirks = Quirks::for_device(device.vendor_id(), device.product_id());

    // fallback when the alt setting does not carry the functional descriptor
    let device_desc = open_dev
        .configurations()
        .find_map(|config| {
            config.interface_alt_settings().find_map(|alt_setting| {
                alt_setting.descriptors().find_map(|d| DfuDescriptor::parse(&d))
            })
        })
        .unwrap_or_default();

    let mut interfaces = Vec::new();
    for configuration in open_dev.configurations() {
        let config = configuration.configuration_value();
        for alt_setting in configuration.interface_alt_settings() {
            if alt_setting.class() != DFU_CLASS
                || alt_setting.subclass() != DFU_SUBCLASS
            {
                continue;
            }
            let descriptor = alt_setting
                .descriptors()
                .find_map(|d| DfuDescriptor::parse(&d))
                .unwrap_or(device_desc);
            let alt_name = alt_setting
                .string_index()
                .and_then(|idx| get_string_descriptor(&open_dev, idx, timeout));
            interfaces.push(DfuInterface {
                vendor_id: device.vendor_id(),
                product_id: device.product_id(),
                serial: device.serial_number().map(String::from),
                bus_id: device.bus_id().to_string(),
                port_chain: device.port_chain().to_vec(),
                device_address: device.device_address(),
                dfu_mode: alt_setting.protocol() == DFU_PROTOCOL_DFU_MODE,
                config,
                interface: alt_setting.interface_number(),
                alt_setting: alt_setting.alternate_setting(),
                alt_name,
                max_packet_size,
                descriptor,
                quirks,
            });
        }
    }
    Ok(interfaces)
}

fn is_dfu_device(dev: &nusb::DeviceInfo) -> bool {
    dev.interfaces()
        .any(|i| i.class() == DFU_CLASS && i.subclass() == DFU_SUBCLASS)
}

fn get_string_descriptor(
    device: &nusb::Device,
    desc_index: NonZeroU8,
    timeout: Duration,
) -> Option<String> {
    let language: u16 = device
        .get_string_descriptor_supported_languages(timeout)
        .wait()
        .ok()?
        .next()
        .unwrap_or(nusb::descriptors::language_id::US_ENGLISH);

    device
        .get_string_descriptor(desc_index, language, timeout)
        .wait()
        .ok()
}
