use std::{thread, time::Duration};

use log::{debug, trace};

use crate::error::*;
use crate::quirks::Quirks;
use crate::request::{ControlTransport, DfuRequest};
use crate::state::DfuState;
use crate::status::{DFU_STATUS_LEN, DfuStatus};

const DFU_STATE_LEN: u16 = 1;

/// Open, claimed DFU interface
///
/// Issues the DFU class requests one at a time. No retries and no state
/// interpretation happen here apart from [DfuConnection::abort_to_idle].
/// Dropping the connection releases the interface.
pub struct DfuConnection<T: ControlTransport> {
    handle: T,
    interface: u16,
    quirks: Quirks,
    timeout: Duration,
}

impl<T: ControlTransport> DfuConnection<T> {
    pub fn new(
        handle: T,
        interface: u8,
        quirks: Quirks,
        timeout: Duration,
    ) -> Self {
        DfuConnection {
            handle,
            interface: interface as u16,
            quirks,
            timeout,
        }
    }

    pub fn interface(&self) -> u8 {
        self.interface as u8
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// Control transfer timeout, also bounds polling of busy states
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `DFU_DETACH`, `timeout_ms` is how long the device waits for a USB reset
    pub fn detach(&self, timeout_ms: u16) -> Result<(), TransportError> {
        self.dfu_cmd_out(DfuRequest::Detach, timeout_ms, &[])
            .map(|_| ())
    }

    /// `DFU_DNLOAD` one block, returns the number of bytes accepted
    pub fn download(
        &self,
        block_nr: u16,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        self.dfu_cmd_out(DfuRequest::Dnload, block_nr, data)
    }

    /// `DFU_UPLOAD` one block of at most `length` bytes
    pub fn upload(
        &self,
        block_nr: u16,
        length: u16,
    ) -> Result<Vec<u8>, TransportError> {
        self.dfu_cmd_in(DfuRequest::Upload, block_nr, length)
    }

    pub fn get_status(&self) -> Result<DfuStatus, TransportError> {
        let data = self.dfu_cmd_in(
            DfuRequest::GetStatus,
            0,
            DFU_STATUS_LEN as u16,
        )?;
        let st = DfuStatus::decode(&data, self.quirks).map_err(|short| {
            TransportError::Short {
                request: DfuRequest::GetStatus,
                got: short.len,
                expected: DFU_STATUS_LEN,
            }
        })?;
        trace!("{st}, poll timeout {} ms", st.poll_timeout);
        Ok(st)
    }

    pub fn clear_status(&self) -> Result<(), TransportError> {
        self.dfu_cmd_out(DfuRequest::ClrStatus, 0, &[]).map(|_| ())
    }

    pub fn get_state(&self) -> Result<DfuState, TransportError> {
        let data = self.dfu_cmd_in(DfuRequest::GetState, 0, DFU_STATE_LEN)?;
        match data.first() {
            Some(state) => Ok(DfuState::from(*state)),
            None => Err(TransportError::Short {
                request: DfuRequest::GetState,
                got: 0,
                expected: DFU_STATE_LEN as usize,
            }),
        }
    }

    pub fn abort(&self) -> Result<(), TransportError> {
        self.dfu_cmd_out(DfuRequest::Abort, 0, &[]).map(|_| ())
    }

    /// Abort any pending transfer and require the device to be in `dfuIDLE`
    ///
    /// Anything else is an error, there is no soft failure here.
    pub fn abort_to_idle(&self) -> Result<DfuStatus, DfuError> {
        self.abort()?;
        let st = self.get_status()?;
        if st.state != DfuState::DfuIdle {
            return Err(DfuError::UnexpectedState {
                expected: DfuState::DfuIdle,
                got: st.state,
            });
        }
        thread::sleep(st.poll_duration());
        Ok(st)
    }

    fn dfu_cmd_out(
        &self,
        req: DfuRequest,
        value: u16,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        if data.len() > u16::MAX as usize {
            return Err(TransportError::Oversize {
                request: req,
                len: data.len(),
            });
        }
        debug!("{req} value={value} len={}", data.len());
        self.handle
            .control_out(req, value, self.interface, data, self.timeout)
    }

    fn dfu_cmd_in(
        &self,
        req: DfuRequest,
        value: u16,
        length: u16,
    ) -> Result<Vec<u8>, TransportError> {
        debug!("{req} value={value} len={length}");
        let mut data = self.handle.control_in(
            req,
            value,
            self.interface,
            length,
            self.timeout,
        )?;
        data.truncate(length as usize);
        Ok(data)
    }
}

impl<T: ControlTransport> Drop for DfuConnection<T> {
    fn drop(&mut self) {
        debug!("Releasing interface {}", self.interface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, status_bytes};
    use crate::status::DfuStatusCode;

    fn connect(mock: &MockDevice) -> DfuConnection<MockDevice> {
        DfuConnection::new(
            mock.clone(),
            3,
            Quirks::empty(),
            crate::DEFAULT_TIMEOUT,
        )
    }

    #[test]
    fn test_request_encoding() {
        let mock = MockDevice::new();
        mock.queue_in(vec![2]);
        let conn = connect(&mock);

        conn.detach(1000).unwrap();
        assert_eq!(conn.download(7, &[1, 2, 3]).unwrap(), 3);
        conn.clear_status().unwrap();
        conn.abort().unwrap();
        assert_eq!(conn.get_state().unwrap(), DfuState::DfuIdle);

        let log = mock.requests();
        assert_eq!(log.len(), 5);
        assert_eq!(log[0].request, DfuRequest::Detach);
        assert_eq!(log[0].value, 1000);
        assert_eq!(log[1].request, DfuRequest::Dnload);
        assert_eq!(log[1].value, 7);
        assert_eq!(log[1].data, vec![1, 2, 3]);
        assert_eq!(log[2].request, DfuRequest::ClrStatus);
        assert_eq!(log[3].request, DfuRequest::Abort);
        assert_eq!(log[4].request, DfuRequest::GetState);
        assert_eq!(log[4].length, 1);
        assert!(log.iter().all(|r| r.index == 3));
    }

    #[test]
    fn test_get_status() {
        let mock = MockDevice::new();
        mock.queue_status(DfuStatusCode::Ok, DfuState::DfuIdle, 10);
        let conn = connect(&mock);

        let st = conn.get_status().unwrap();
        assert_eq!(st.state, DfuState::DfuIdle);
        assert_eq!(st.poll_timeout, 10);
        assert_eq!(mock.requests()[0].length, 6);
    }

    #[test]
    fn test_short_replies() {
        let mock = MockDevice::new();
        mock.queue_in(vec![0, 0, 0]);
        mock.queue_in(vec![]);
        let conn = connect(&mock);

        assert!(matches!(
            conn.get_status(),
            Err(TransportError::Short {
                request: DfuRequest::GetStatus,
                got: 3,
                expected: 6
            })
        ));
        assert!(matches!(
            conn.get_state(),
            Err(TransportError::Short {
                request: DfuRequest::GetState,
                got: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_oversize_download() {
        let mock = MockDevice::new();
        let conn = connect(&mock);
        let data = vec![0u8; 65536];
        assert!(matches!(
            conn.download(0, &data),
            Err(TransportError::Oversize { len: 65536, .. })
        ));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_upload_truncates_to_requested_length() {
        let mock = MockDevice::new();
        mock.queue_in(vec![0xaa; 8]);
        let conn = connect(&mock);
        assert_eq!(conn.upload(0, 4).unwrap(), vec![0xaa; 4]);
    }

    #[test]
    fn test_abort_to_idle() {
        let mock = MockDevice::new();
        mock.queue_in(status_bytes(DfuStatusCode::Ok, DfuState::DfuIdle, 0));
        mock.queue_status(DfuStatusCode::Ok, DfuState::DnloadIdle, 0);
        let conn = connect(&mock);

        assert_eq!(conn.abort_to_idle().unwrap().state, DfuState::DfuIdle);
        assert!(matches!(
            conn.abort_to_idle(),
            Err(DfuError::UnexpectedState {
                expected: DfuState::DfuIdle,
                got: DfuState::DnloadIdle
            })
        ));
    }

    #[test]
    fn test_abort_to_idle_transport_failure() {
        let mock = MockDevice::new();
        mock.fail_next(DfuRequest::Abort);
        let conn = connect(&mock);
        assert!(matches!(
            conn.abort_to_idle(),
            Err(DfuError::Transport(_))
        ));
        // no GETSTATUS after a failed ABORT
        assert_eq!(mock.requests().len(), 1);
    }
}
