use std::{fmt, time::Duration};

use nusb::{
    MaybeFuture,
    transfer::{ControlIn, ControlOut, ControlType, Recipient},
};

use crate::error::TransportError;

/// DFU class requests, DFU 1.1 section 3
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DfuRequest {
    Detach = 0,
    Dnload = 1,
    Upload = 2,
    GetStatus = 3,
    ClrStatus = 4,
    GetState = 5,
    Abort = 6,
}

impl DfuRequest {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Device to host requests
    pub fn is_in(self) -> bool {
        matches!(
            self,
            DfuRequest::Upload | DfuRequest::GetStatus | DfuRequest::GetState
        )
    }
}

impl fmt::Display for DfuRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DfuRequest::Detach => "DFU_DETACH",
            DfuRequest::Dnload => "DFU_DNLOAD",
            DfuRequest::Upload => "DFU_UPLOAD",
            DfuRequest::GetStatus => "DFU_GETSTATUS",
            DfuRequest::ClrStatus => "DFU_CLRSTATUS",
            DfuRequest::GetState => "DFU_GETSTATE",
            DfuRequest::Abort => "DFU_ABORT",
        };
        write!(f, "{name}")
    }
}

/// Class-specific, interface-recipient control transfers
///
/// `index` is always the interface number.
pub trait ControlTransport {
    fn control_in(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Returns the number of bytes accepted by the device.
    fn control_out(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

impl ControlTransport for nusb::Interface {
    fn control_in(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        nusb::Interface::control_in(
            self,
            ControlIn {
                control_type: ControlType::Class,
                recipient: Recipient::Interface,
                request: request.code(),
                value,
                index,
                length,
            },
            timeout,
        )
        .wait()
        .map_err(|source| TransportError::Transfer { request, source })
    }

    fn control_out(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        nusb::Interface::control_out(
            self,
            ControlOut {
                control_type: ControlType::Class,
                recipient: Recipient::Interface,
                request: request.code(),
                value,
                index,
                data,
            },
            timeout,
        )
        .wait()
        .map_err(|source| TransportError::Transfer { request, source })?;
        Ok(data.len())
    }
}
