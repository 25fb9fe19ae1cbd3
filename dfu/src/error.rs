use thiserror::Error;

use crate::request::DfuRequest;
use crate::state::DfuState;

/// Failure of the control-transfer layer underneath the DFU requests.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("{request} transfer error: {source}")]
    Transfer {
        request: DfuRequest,
        source: nusb::transfer::TransferError,
    },

    #[error("{request} returned {got} bytes, expected {expected}")]
    Short {
        request: DfuRequest,
        got: usize,
        expected: usize,
    },

    #[error("Device at {0} is no longer attached")]
    Gone(String),

    #[error("{request} payload of {len} bytes exceeds 65535")]
    Oversize { request: DfuRequest, len: usize },
}

/// Precondition failures detected before the device is modified.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No DFU capable USB device available")]
    NoDevice,

    #[error(
        "Ambiguous device: {count} DFU interfaces match, a bus reset during \
         transfer would change the device address so multiple matches \
         cannot be told apart (specify serial, path or interface)"
    )]
    Ambiguous { count: usize },

    #[error(
        "File ID {file_vendor:04x}:{file_product:04x} does not match \
         device ({device_vendor:04x}:{device_product:04x})"
    )]
    IdMismatch {
        file_vendor: u16,
        file_product: u16,
        device_vendor: u16,
        device_product: u16,
    },

    #[error(
        "Transfer size unspecified: device reports none and no override \
         was given"
    )]
    TransferSizeUnspecified,
}

/// Classified failure of a DFU operation.
#[derive(Error, Debug)]
pub enum DfuError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Device still in runtime mode ({state}), DFU mode required")]
    RuntimeMode { state: DfuState },

    #[error("Device in state {got}, expected {expected}")]
    UnexpectedState { expected: DfuState, got: DfuState },

    #[error("Device reported status error: {0}")]
    Status(crate::status::DfuStatusCode),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Device still in {state} after {retries} recovery attempts")]
    LoopGuard { state: DfuState, retries: u32 },

    #[error("Device enumeration failed: {0}")]
    Enumerate(#[source] TransportError),

    #[error("File loader failed: {0}")]
    File(#[from] dfu_file::DfuFileError),

    #[error("Download engine failed: {0}")]
    Download(#[source] Box<DfuError>),

    #[error("Timeout")]
    Timeout,
}

impl From<nusb::Error> for DfuError {
    fn from(err: nusb::Error) -> Self {
        DfuError::Transport(TransportError::Usb(err))
    }
}
