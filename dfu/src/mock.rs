//! Scripted DFU device for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nusb::transfer::TransferError;

use crate::error::TransportError;
use crate::request::{ControlTransport, DfuRequest};
use crate::state::DfuState;
use crate::status::DfuStatusCode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedRequest {
    pub request: DfuRequest,
    pub value: u16,
    pub index: u16,
    pub length: u16,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    replies: VecDeque<Vec<u8>>,
    default_reply: Option<Vec<u8>>,
    failures: HashSet<u8>,
    log: Vec<LoggedRequest>,
    opened: usize,
    released: usize,
}

/// Mock device. Clones share the same script and request log.
#[derive(Clone, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<Inner>>,
}

pub fn status_bytes(
    status: DfuStatusCode,
    state: DfuState,
    poll_timeout: u32,
) -> Vec<u8> {
    let poll = poll_timeout.to_le_bytes();
    vec![status.code(), poll[0], poll[1], poll[2], state.code(), 0]
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the payload of the next device to host request.
    pub fn queue_in(&self, data: Vec<u8>) {
        self.inner.lock().unwrap().replies.push_back(data);
    }

    pub fn queue_status(
        &self,
        status: DfuStatusCode,
        state: DfuState,
        poll_timeout: u32,
    ) {
        self.queue_in(status_bytes(status, state, poll_timeout));
    }

    /// Reply used once the queue is exhausted.
    pub fn set_default_status(&self, status: DfuStatusCode, state: DfuState) {
        self.inner.lock().unwrap().default_reply =
            Some(status_bytes(status, state, 0));
    }

    /// Make the next request of this kind stall.
    pub fn fail_next(&self, request: DfuRequest) {
        self.inner.lock().unwrap().failures.insert(request.code());
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn count(&self, request: DfuRequest) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.request == request)
            .count()
    }

    pub fn open_handle(&self) -> MockHandle {
        self.inner.lock().unwrap().opened += 1;
        MockHandle {
            device: self.clone(),
        }
    }

    pub fn opened(&self) -> usize {
        self.inner.lock().unwrap().opened
    }

    pub fn released(&self) -> usize {
        self.inner.lock().unwrap().released
    }

    fn record(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        length: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(LoggedRequest {
            request,
            value,
            index,
            length,
            data: data.to_vec(),
        });
        if inner.failures.remove(&request.code()) {
            return Err(TransportError::Transfer {
                request,
                source: TransferError::Stall,
            });
        }
        Ok(())
    }
}

impl ControlTransport for MockDevice {
    fn control_in(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        length: u16,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(request, value, index, length, &[])?;
        let mut inner = self.inner.lock().unwrap();
        match inner.replies.pop_front() {
            Some(data) => Ok(data),
            None => inner.default_reply.clone().ok_or(
                TransportError::Transfer {
                    request,
                    source: TransferError::Stall,
                },
            ),
        }
    }

    fn control_out(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.record(request, value, index, data.len() as u16, data)?;
        Ok(data.len())
    }
}

/// Handle returned by a mock enumerator, counts its release.
pub struct MockHandle {
    device: MockDevice,
}

impl ControlTransport for MockHandle {
    fn control_in(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.device.control_in(request, value, index, length, timeout)
    }

    fn control_out(
        &self,
        request: DfuRequest,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.device.control_out(request, value, index, data, timeout)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.device.inner.lock().unwrap().released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_replies_and_log() {
        let mock = MockDevice::new();
        mock.queue_in(vec![1, 2]);
        let timeout = Duration::from_millis(10);

        assert_eq!(
            mock.control_in(DfuRequest::Upload, 0, 0, 2, timeout).unwrap(),
            vec![1, 2]
        );
        // queue exhausted, no default
        assert!(mock.control_in(DfuRequest::Upload, 1, 0, 2, timeout).is_err());

        mock.set_default_status(DfuStatusCode::Ok, DfuState::DfuIdle);
        let reply = mock
            .control_in(DfuRequest::GetStatus, 0, 0, 6, timeout)
            .unwrap();
        assert_eq!(reply[4], DfuState::DfuIdle.code());
        assert_eq!(mock.count(DfuRequest::Upload), 2);
    }

    #[test]
    fn test_mock_handle_release() {
        let mock = MockDevice::new();
        let handle = mock.open_handle();
        assert_eq!(mock.opened(), 1);
        assert_eq!(mock.released(), 0);
        drop(handle);
        assert_eq!(mock.released(), 1);
    }
}
