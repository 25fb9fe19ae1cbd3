use std::time::Duration;

use crate::interface::DfuInterface;

/// Vendor / product id meaning "any device" in firmware files
pub const WILDCARD_ID: u16 = 0xffff;

/// Default cap on CLRSTATUS / ABORT recovery attempts while normalizing
pub const DEFAULT_MAX_RECOVERY: u32 = 5;

/// Which device, configuration and interface to operate on
///
/// Unset fields match anything. The `*_dfu` variants apply to devices in DFU
/// mode and fall back to the runtime values when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    pub vendor: Option<u16>,
    pub product: Option<u16>,
    pub vendor_dfu: Option<u16>,
    pub product_dfu: Option<u16>,
    pub serial: Option<String>,
    pub serial_dfu: Option<String>,
    /// `BUS-PORT.PORT...`
    pub path: Option<String>,
    /// `bConfigurationValue`
    pub config: Option<u8>,
    pub interface: Option<u8>,
    pub alt_setting: Option<u8>,
    pub alt_name: Option<String>,
    /// Device address on its bus
    pub devnum: Option<u8>,
}

impl MatchCriteria {
    pub fn with_vendor_product(
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> Self {
        MatchCriteria {
            vendor,
            product,
            ..Default::default()
        }
    }

    /// Take over non-wildcard ids declared by a firmware file for whichever
    /// of vendor / product is still unset.
    pub fn adopt_file_ids(&mut self, vendor: u16, product: u16) {
        if self.vendor.is_none() && vendor != WILDCARD_ID {
            self.vendor = Some(vendor);
        }
        if self.product.is_none() && product != WILDCARD_ID {
            self.product = Some(product);
        }
    }

    /// Cheap pre-filter on ids before a device is opened
    pub fn may_match_ids(&self, vendor: u16, product: u16) -> bool {
        self.ids_match(false, vendor, product)
            || self.ids_match(true, vendor, product)
    }

    fn ids_match(&self, dfu_mode: bool, vendor: u16, product: u16) -> bool {
        let (want_vendor, want_product) = if dfu_mode {
            (
                self.vendor_dfu.or(self.vendor),
                self.product_dfu.or(self.product),
            )
        } else {
            (self.vendor, self.product)
        };
        want_vendor.is_none_or(|id| id == vendor)
            && want_product.is_none_or(|id| id == product)
    }

    pub fn matches_device(
        &self,
        dfu_mode: bool,
        vendor: u16,
        product: u16,
        serial: Option<&str>,
    ) -> bool {
        let want_serial = if dfu_mode {
            self.serial_dfu.as_deref().or(self.serial.as_deref())
        } else {
            self.serial.as_deref()
        };
        self.ids_match(dfu_mode, vendor, product)
            && want_serial.is_none_or(|want| serial == Some(want))
    }

    pub fn matches_location(&self, path: &str, devnum: u8) -> bool {
        self.path.as_deref().is_none_or(|want| want == path)
            && self.devnum.is_none_or(|want| want == devnum)
    }

    pub fn matches_interface(
        &self,
        config: u8,
        interface: u8,
        alt_setting: u8,
        alt_name: Option<&str>,
    ) -> bool {
        self.config.is_none_or(|want| want == config)
            && self.interface.is_none_or(|want| want == interface)
            && self.alt_setting.is_none_or(|want| want == alt_setting)
            && self
                .alt_name
                .as_deref()
                .is_none_or(|want| alt_name == Some(want))
    }

    /// All criteria against a fully described interface
    pub fn matches(&self, intf: &DfuInterface) -> bool {
        self.matches_device(
            intf.is_dfu_mode(),
            intf.vendor_id(),
            intf.product_id(),
            intf.serial(),
        ) && self.matches_location(&intf.path(), intf.device_address())
            && self.matches_interface(
                intf.config(),
                intf.interface(),
                intf.alt_setting(),
                intf.alt_name(),
            )
    }
}

/// Settings of one flashing session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashConfig {
    /// Bound on every control transfer
    pub timeout: Duration,
    /// Used when the device does not advertise `wTransferSize`
    pub transfer_size: Option<u16>,
    /// Cap on recovery requests while bringing the device to `dfuIDLE`
    pub max_recovery: u32,
    pub criteria: MatchCriteria,
}

impl Default for FlashConfig {
    fn default() -> Self {
        FlashConfig {
            timeout: crate::DEFAULT_TIMEOUT,
            transfer_size: None,
            max_recovery: DEFAULT_MAX_RECOVERY,
            criteria: MatchCriteria::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adopt_file_ids() {
        let mut criteria = MatchCriteria::default();
        criteria.adopt_file_ids(0x0483, WILDCARD_ID);
        assert_eq!(criteria.vendor, Some(0x0483));
        assert_eq!(criteria.product, None);

        let mut criteria =
            MatchCriteria::with_vendor_product(Some(0x1234), None);
        criteria.adopt_file_ids(0x0483, 0xdf11);
        assert_eq!(criteria.vendor, Some(0x1234));
        assert_eq!(criteria.product, Some(0xdf11));
    }

    #[test]
    fn test_dfu_mode_ids() {
        let criteria = MatchCriteria {
            vendor: Some(0x1d50),
            product: Some(0x6089),
            product_dfu: Some(0x608a),
            ..Default::default()
        };
        assert!(criteria.matches_device(false, 0x1d50, 0x6089, None));
        assert!(!criteria.matches_device(false, 0x1d50, 0x608a, None));
        assert!(criteria.matches_device(true, 0x1d50, 0x608a, None));
        assert!(!criteria.matches_device(true, 0x1d50, 0x6089, None));
        assert!(criteria.may_match_ids(0x1d50, 0x608a));
        assert!(!criteria.may_match_ids(0x0483, 0x608a));
    }

    #[test]
    fn test_serial_match() {
        let criteria = MatchCriteria {
            serial: Some("ABC".into()),
            serial_dfu: Some("XYZ".into()),
            ..Default::default()
        };
        assert!(criteria.matches_device(false, 1, 2, Some("ABC")));
        assert!(!criteria.matches_device(false, 1, 2, None));
        assert!(criteria.matches_device(true, 1, 2, Some("XYZ")));
        assert!(!criteria.matches_device(true, 1, 2, Some("ABC")));
    }

    #[test]
    fn test_interface_match() {
        let intf = DfuInterface::new(0x0483, 0xdf11).with_interface(0, 1);
        assert!(MatchCriteria::default().matches(&intf));

        let criteria = MatchCriteria {
            alt_setting: Some(1),
            ..Default::default()
        };
        assert!(criteria.matches(&intf));

        let criteria = MatchCriteria {
            alt_name: Some("@Internal Flash".into()),
            ..Default::default()
        };
        assert!(!criteria.matches(&intf));

        let criteria = MatchCriteria {
            path: Some("1-2.3".into()),
            ..Default::default()
        };
        assert!(criteria.matches_location("1-2.3", 9));
        assert!(!criteria.matches_location("1-2", 9));
    }
}
