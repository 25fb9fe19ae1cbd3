use bitflags::bitflags;

/// Poll timeout used instead of the device reported `bwPollTimeout` when
/// [Quirks::POLL_TIMEOUT] is set, in milliseconds.
pub const DEFAULT_POLL_TIMEOUT: u32 = 5;

const VENDOR_OPENMOKO: u16 = 0x1d50;
const VENDOR_FIC: u16 = 0x1457;
const VENDOR_VOTI: u16 = 0x16c0;
const VENDOR_LEAFLABS: u16 = 0x1eaf;

const PRODUCT_SIMTRACE: u16 = 0x0762;
const PRODUCT_OPENPCD: u16 = 0x076b;
const PRODUCT_OPENPICC: u16 = 0x076c;
const PRODUCT_MAPLE3: u16 = 0x0003;

bitflags! {
    /// Known deviations from the DFU specification, per device identity
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Quirks: u32 {
        /// Device reports a bogus `bwPollTimeout`
        const POLL_TIMEOUT = 1 << 0;
    }
}

// (vendor, product or None for every product of the vendor, quirks)
const QUIRK_TABLE: &[(u16, Option<u16>, Quirks)] = &[
    (VENDOR_OPENMOKO, None, Quirks::POLL_TIMEOUT),
    (VENDOR_FIC, None, Quirks::POLL_TIMEOUT),
    (VENDOR_VOTI, Some(PRODUCT_OPENPCD), Quirks::POLL_TIMEOUT),
    (VENDOR_VOTI, Some(PRODUCT_SIMTRACE), Quirks::POLL_TIMEOUT),
    (VENDOR_VOTI, Some(PRODUCT_OPENPICC), Quirks::POLL_TIMEOUT),
    (VENDOR_LEAFLABS, Some(PRODUCT_MAPLE3), Quirks::POLL_TIMEOUT),
];

impl Quirks {
    pub fn for_device(vendor_id: u16, product_id: u16) -> Self {
        QUIRK_TABLE
            .iter()
            .filter(|(vid, pid, _)| {
                *vid == vendor_id && pid.is_none_or(|pid| pid == product_id)
            })
            .fold(Quirks::empty(), |acc, (_, _, quirks)| acc | *quirks)
    }
}
