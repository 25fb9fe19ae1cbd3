pub(crate) const DFU_DESC_TYPE: u8 = 0x21;
// DFU 1.0 descriptors lack bcdDFUVersion
pub(crate) const DFU_DESC_MIN_LEN: usize = 7;

/// DFU functional descriptor
///
/// Represents the DFU functional descriptor as described in section 4.1.3.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DfuDescriptor {
    attributes: u8,
    detach_timeout: u16,
    transfer_size: u16,
    dfu_version: u16,
}

impl DfuDescriptor {
    const BIT_CAN_DNLOAD: u8 = 1 << 0;
    const BIT_CAN_UPLOAD: u8 = 1 << 1;
    const BIT_MANIFESTATION_TOLERANT: u8 = 1 << 2;
    const BIT_WILL_DETACH: u8 = 1 << 3;

    pub fn new(
        attributes: u8,
        detach_timeout: u16,
        transfer_size: u16,
        dfu_version: u16,
    ) -> Self {
        Self {
            attributes,
            detach_timeout,
            transfer_size,
            dfu_version,
        }
    }

    /// Parse a raw descriptor, `None` unless it is a DFU functional descriptor
    pub fn parse(raw_desc: &[u8]) -> Option<Self> {
        if raw_desc.len() < DFU_DESC_MIN_LEN || raw_desc[1] != DFU_DESC_TYPE {
            return None;
        }
        let le16 =
            |i: usize| u16::from_le_bytes([raw_desc[i], raw_desc[i + 1]]);
        Some(Self {
            attributes: raw_desc[2],
            detach_timeout: le16(3),
            transfer_size: le16(5),
            dfu_version: if raw_desc.len() >= 9 { le16(7) } else { 0x0100 },
        })
    }

    /// Download capable (`bitCanDnload`)
    #[doc(alias = "bitCanDnload")]
    pub fn can_download(&self) -> bool {
        self.attributes & Self::BIT_CAN_DNLOAD != 0
    }

    /// Upload capable (`bitCanUpload`)
    #[doc(alias = "bitCanUpload")]
    pub fn can_upload(&self) -> bool {
        self.attributes & Self::BIT_CAN_UPLOAD != 0
    }

    /// Device is able to communicate via USB after
    /// Manifestation phase (`bitManifestationTolerant`)
    #[doc(alias = "bitManifestationTolerant")]
    pub fn manifestation_tolerant(&self) -> bool {
        self.attributes & Self::BIT_MANIFESTATION_TOLERANT != 0
    }

    /// Device will perform a bus detach-attach sequence when it receives
    /// a `DFU_DETACH` request (`bitWillDetach`). The host must not issue a USB Reset.
    #[doc(alias = "bitWillDetach")]
    pub fn will_detach(&self) -> bool {
        self.attributes & Self::BIT_WILL_DETACH != 0
    }

    /// Time, in milliseconds, that the device will wait after receipt of the `DFU_DETACH`
    /// request (`wDetachTimeOut`).
    #[doc(alias = "wDetachTimeout")]
    pub fn detach_timeout(&self) -> u16 {
        self.detach_timeout
    }

    /// Maximum number of bytes that the device can accept per control-write transaction
    /// (`wTransferSize`). Zero when the device does not say.
    #[doc(alias = "wTransferSize")]
    pub fn transfer_size(&self) -> u16 {
        self.transfer_size
    }

    /// Numeric expression identifying the version of the DFU Specification release
    /// (`bcdDFUVersion`).
    #[doc(alias = "bcdDFUVersion")]
    pub fn dfu_version(&self) -> u16 {
        self.dfu_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let raw = [9, 0x21, 0x0b, 0xff, 0x00, 0x00, 0x08, 0x1a, 0x01];
        let desc = DfuDescriptor::parse(&raw).unwrap();
        assert!(desc.can_download());
        assert!(desc.can_upload());
        assert!(!desc.manifestation_tolerant());
        assert!(desc.will_detach());
        assert_eq!(desc.detach_timeout(), 255);
        assert_eq!(desc.transfer_size(), 2048);
        assert_eq!(desc.dfu_version(), 0x011a);
    }

    #[test]
    fn test_parse_dfu10_descriptor() {
        let raw = [7, 0x21, 0x01, 0x10, 0x00, 0x40, 0x00];
        let desc = DfuDescriptor::parse(&raw).unwrap();
        assert_eq!(desc.transfer_size(), 64);
        assert_eq!(desc.dfu_version(), 0x0100);
    }

    #[test]
    fn test_reject_other_descriptors() {
        assert_eq!(DfuDescriptor::parse(&[9, 0x04, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(DfuDescriptor::parse(&[3, 0x21, 0]), None);
    }
}
