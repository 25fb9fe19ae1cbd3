//! Human readable names for DFU state and status codes
//!
//! Reporting only: nothing in the protocol logic branches on these strings.

const STATE_LABELS: [&str; 11] = [
    "appIDLE",
    "appDETACH",
    "dfuIDLE",
    "dfuDNLOAD-SYNC",
    "dfuDNBUSY",
    "dfuDNLOAD-IDLE",
    "dfuMANIFEST-SYNC",
    "dfuMANIFEST",
    "dfuMANIFEST-WAIT-RESET",
    "dfuUPLOAD-IDLE",
    "dfuERROR",
];

// DFU 1.1 section 6.1.2, indexed by bStatus
const STATUS_SENTENCES: [&str; 16] = [
    "no error condition present",
    "file is not targeted for use by this device",
    "file is for this device but fails some vendor-specific verification test",
    "device is unable to write memory",
    "memory erase function failed",
    "memory erase check failed",
    "program memory function failed",
    "programmed memory failed verification",
    "cannot program memory due to received address that is out of range",
    "received DFU_DNLOAD with wLength = 0, but device does not think it has all of the data yet",
    "device's firmware is corrupt, it cannot return to run-time (non-DFU) operations",
    "iString indicates a vendor-specific error",
    "device detected unexpected USB reset signaling",
    "device detected unexpected power on reset",
    "something went wrong, but the device does not know what it was",
    "device stalled an unexpected request",
];

/// Returned by [status_to_string] for codes above 15.
pub const INVALID_STATUS: &str = "INVALID";

/// Label of a `bState` code, `None` for reserved codes.
pub fn state_to_string(state: u8) -> Option<&'static str> {
    STATE_LABELS.get(state as usize).copied()
}

/// Description of a `bStatus` code.
pub fn status_to_string(status: u8) -> &'static str {
    STATUS_SENTENCES
        .get(status as usize)
        .copied()
        .unwrap_or(INVALID_STATUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DfuState;

    #[test]
    fn test_state_labels() {
        assert_eq!(state_to_string(DfuState::DfuIdle.code()), Some("dfuIDLE"));
        assert_eq!(state_to_string(0), Some("appIDLE"));
        assert_eq!(state_to_string(10), Some("dfuERROR"));
        for code in 0..11u8 {
            assert!(state_to_string(code).is_some());
        }
        for code in 11..=u8::MAX {
            assert_eq!(state_to_string(code), None);
        }
    }

    #[test]
    fn test_status_sentences() {
        assert_eq!(status_to_string(0), "no error condition present");
        assert_eq!(
            status_to_string(15),
            "device stalled an unexpected request"
        );
        for code in 0..16u8 {
            assert_ne!(status_to_string(code), INVALID_STATUS);
        }
        assert_eq!(status_to_string(16), INVALID_STATUS);
        assert_eq!(status_to_string(0xff), INVALID_STATUS);
    }
}
