use std::{fmt, time::Duration};

use crate::diagnostic::status_to_string;
use crate::quirks::{DEFAULT_POLL_TIMEOUT, Quirks};
use crate::state::DfuState;

pub(crate) const DFU_STATUS_LEN: usize = 6;

/// Status code (`bStatus`), DFU 1.1 section 6.1.2
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfuStatusCode {
    Ok,
    ErrTarget,
    ErrFile,
    ErrWrite,
    ErrErase,
    ErrCheckErased,
    ErrProg,
    ErrVerify,
    ErrAddress,
    ErrNotDone,
    ErrFirmware,
    ErrVendor,
    ErrUsbReset,
    ErrPowerOnReset,
    ErrUnknown,
    ErrStalledPkt,
    Invalid(u8),
}

impl DfuStatusCode {
    pub fn code(&self) -> u8 {
        match self {
            DfuStatusCode::Ok => 0,
            DfuStatusCode::ErrTarget => 1,
            DfuStatusCode::ErrFile => 2,
            DfuStatusCode::ErrWrite => 3,
            DfuStatusCode::ErrErase => 4,
            DfuStatusCode::ErrCheckErased => 5,
            DfuStatusCode::ErrProg => 6,
            DfuStatusCode::ErrVerify => 7,
            DfuStatusCode::ErrAddress => 8,
            DfuStatusCode::ErrNotDone => 9,
            DfuStatusCode::ErrFirmware => 10,
            DfuStatusCode::ErrVendor => 11,
            DfuStatusCode::ErrUsbReset => 12,
            DfuStatusCode::ErrPowerOnReset => 13,
            DfuStatusCode::ErrUnknown => 14,
            DfuStatusCode::ErrStalledPkt => 15,
            DfuStatusCode::Invalid(code) => *code,
        }
    }
}

impl From<u8> for DfuStatusCode {
    fn from(code: u8) -> Self {
        match code {
            0 => DfuStatusCode::Ok,
            1 => DfuStatusCode::ErrTarget,
            2 => DfuStatusCode::ErrFile,
            3 => DfuStatusCode::ErrWrite,
            4 => DfuStatusCode::ErrErase,
            5 => DfuStatusCode::ErrCheckErased,
            6 => DfuStatusCode::ErrProg,
            7 => DfuStatusCode::ErrVerify,
            8 => DfuStatusCode::ErrAddress,
            9 => DfuStatusCode::ErrNotDone,
            10 => DfuStatusCode::ErrFirmware,
            11 => DfuStatusCode::ErrVendor,
            12 => DfuStatusCode::ErrUsbReset,
            13 => DfuStatusCode::ErrPowerOnReset,
            14 => DfuStatusCode::ErrUnknown,
            15 => DfuStatusCode::ErrStalledPkt,
            other => DfuStatusCode::Invalid(other),
        }
    }
}

impl fmt::Display for DfuStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", status_to_string(self.code()), self.code())
    }
}

/// Decoded `DFU_GETSTATUS` response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DfuStatus {
    pub status: DfuStatusCode,
    /// Minimum wait before the next request, in milliseconds (24 bits)
    pub poll_timeout: u32,
    pub state: DfuState,
    pub string_index: u8,
}

/// A `DFU_GETSTATUS` response shorter than 6 bytes.
///
/// `status` holds the [DfuStatus::default()] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortStatus {
    pub len: usize,
    pub status: DfuStatus,
}

impl Default for DfuStatus {
    /// Record used when the device gave no usable answer
    fn default() -> Self {
        DfuStatus {
            status: DfuStatusCode::ErrUnknown,
            poll_timeout: 0,
            state: DfuState::DfuError,
            string_index: 0,
        }
    }
}

impl DfuStatus {
    /// Decode a GETSTATUS response.
    ///
    /// Bytes past the sixth are ignored. Out of range codes are kept as
    /// [DfuStatusCode::Invalid] / [DfuState::Reserved].
    pub fn decode(data: &[u8], quirks: Quirks) -> Result<Self, ShortStatus> {
        let Some(data) = data.get(..DFU_STATUS_LEN) else {
            return Err(ShortStatus {
                len: data.len(),
                status: DfuStatus::default(),
            });
        };
        let poll_timeout = if quirks.contains(Quirks::POLL_TIMEOUT) {
            DEFAULT_POLL_TIMEOUT
        } else {
            u32::from_le_bytes([data[1], data[2], data[3], 0])
        };
        Ok(DfuStatus {
            status: DfuStatusCode::from(data[0]),
            poll_timeout,
            state: DfuState::from(data[4]),
            string_index: data[5],
        })
    }

    pub fn poll_duration(&self) -> Duration {
        Duration::from_millis(self.poll_timeout as u64)
    }

    pub fn is_ok(&self) -> bool {
        self.status == DfuStatusCode::Ok
    }

    /// `Err` with the status code unless the device reports OK
    pub fn ok(&self) -> Result<(), crate::DfuError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(crate::DfuError::Status(self.status))
        }
    }
}

impl fmt::Display for DfuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state({}) = {}, status({}) = {}",
            self.state.code(),
            self.state,
            self.status.code(),
            status_to_string(self.status.code())
        )
    }
}
