use std::fmt;

use crate::diagnostic::state_to_string;

/// Device state (`bState`), DFU 1.1 section 6.1.2
///
/// Decoding is total: codes outside the eleven named states are kept as
/// [DfuState::Reserved].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfuState {
    AppIdle,
    AppDetach,
    DfuIdle,
    DnloadSync,
    DnloadBusy,
    DnloadIdle,
    ManifestSync,
    Manifest,
    ManifestWaitReset,
    UploadIdle,
    DfuError,
    Reserved(u8),
}

impl DfuState {
    pub fn code(&self) -> u8 {
        match self {
            DfuState::AppIdle => 0,
            DfuState::AppDetach => 1,
            DfuState::DfuIdle => 2,
            DfuState::DnloadSync => 3,
            DfuState::DnloadBusy => 4,
            DfuState::DnloadIdle => 5,
            DfuState::ManifestSync => 6,
            DfuState::Manifest => 7,
            DfuState::ManifestWaitReset => 8,
            DfuState::UploadIdle => 9,
            DfuState::DfuError => 10,
            DfuState::Reserved(code) => *code,
        }
    }

    /// Runtime (application) mode, the device has not entered DFU mode yet
    pub fn is_runtime(&self) -> bool {
        matches!(self, DfuState::AppIdle | DfuState::AppDetach)
    }
}

impl From<u8> for DfuState {
    fn from(code: u8) -> Self {
        match code {
            0 => DfuState::AppIdle,
            1 => DfuState::AppDetach,
            2 => DfuState::DfuIdle,
            3 => DfuState::DnloadSync,
            4 => DfuState::DnloadBusy,
            5 => DfuState::DnloadIdle,
            6 => DfuState::ManifestSync,
            7 => DfuState::Manifest,
            8 => DfuState::ManifestWaitReset,
            9 => DfuState::UploadIdle,
            10 => DfuState::DfuError,
            other => DfuState::Reserved(other),
        }
    }
}

impl fmt::Display for DfuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match state_to_string(self.code()) {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "reserved state {}", self.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        for code in 0..=u8::MAX {
            assert_eq!(DfuState::from(code).code(), code);
        }
        assert_eq!(DfuState::from(2), DfuState::DfuIdle);
        assert_eq!(DfuState::from(11), DfuState::Reserved(11));
    }

    #[test]
    fn test_runtime_states() {
        assert!(DfuState::AppIdle.is_runtime());
        assert!(DfuState::AppDetach.is_runtime());
        assert!(!DfuState::DfuIdle.is_runtime());
        assert!(!DfuState::Reserved(0x20).is_runtime());
    }

    #[test]
    fn test_display() {
        assert_eq!(DfuState::DnloadIdle.to_string(), "dfuDNLOAD-IDLE");
        assert_eq!(DfuState::Reserved(42).to_string(), "reserved state 42");
    }
}
