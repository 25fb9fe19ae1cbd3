use std::{
    thread,
    time::{Duration, Instant},
};

use dfu_file::DfuFile;
use log::{debug, info};

use crate::{
    ConfigError, DfuConnection, DfuError, DfuInterface, DfuState,
    TransportError, request::ControlTransport,
};

// Some devices need a while in the manifest phase before answering
const MANIFEST_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const MAX_MANIFEST_POLLS: u32 = 60;

/// Receives progress of a flash operation, called on the flashing thread
pub trait ProgressSink {
    fn progress(&mut self, done: usize, total: usize);

    /// Called exactly once per flash with its outcome
    fn finished(&mut self, _result: Result<(), &DfuError>) {}
}

/// Discards all progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&mut self, _done: usize, _total: usize) {}
}

/// Transfers a firmware payload to a device sitting in `dfuIDLE`
pub trait DownloadEngine {
    fn download<T: ControlTransport>(
        &mut self,
        connection: &DfuConnection<T>,
        intf: &DfuInterface,
        transfer_size: u16,
        file: &DfuFile,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), DfuError>;
}

/// Plain DFU 1.1 download: one `DFU_DNLOAD` per block, then manifestation
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkedDownload;

impl DownloadEngine for ChunkedDownload {
    fn download<T: ControlTransport>(
        &mut self,
        connection: &DfuConnection<T>,
        intf: &DfuInterface,
        transfer_size: u16,
        file: &DfuFile,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), DfuError> {
        if transfer_size == 0 {
            return Err(ConfigError::TransferSizeUnspecified.into());
        }
        let payload = file.payload();
        let total = payload.len();
        let mut bytes_downloaded: usize = 0;
        let mut block_nr: u16 = 0;

        info!("Downloading {total} bytes in blocks of {transfer_size}");
        for chunk in payload.chunks(transfer_size as usize) {
            let sent = connection.download(block_nr, chunk)?;
            if sent != chunk.len() {
                return Err(TransportError::Short {
                    request: crate::DfuRequest::Dnload,
                    got: sent,
                    expected: chunk.len(),
                }
                .into());
            }
            wait_block_done(connection)?;

            block_nr = block_nr.wrapping_add(1);
            bytes_downloaded += chunk.len();
            progress.progress(bytes_downloaded, total);
        }

        // zero length download signals the end of the image
        debug!("Sending end of image, block {block_nr}");
        connection.download(block_nr, &[])?;
        manifest(connection, intf)
    }
}

fn wait_block_done<T: ControlTransport>(
    connection: &DfuConnection<T>,
) -> Result<(), DfuError> {
    let start = Instant::now();
    loop {
        let st = connection.get_status()?;
        thread::sleep(st.poll_duration());
        match st.state {
            DfuState::DnloadIdle
            | DfuState::DfuError
            | DfuState::Manifest
            | DfuState::ManifestSync => return st.ok(),
            DfuState::DnloadSync | DfuState::DnloadBusy => {
                if start.elapsed() >= connection.timeout() * 2 {
                    return Err(DfuError::Timeout);
                }
            }
            got => {
                return Err(DfuError::UnexpectedState {
                    expected: DfuState::DnloadIdle,
                    got,
                });
            }
        }
    }
}

fn manifest<T: ControlTransport>(
    connection: &DfuConnection<T>,
    intf: &DfuInterface,
) -> Result<(), DfuError> {
    for _ in 0..MAX_MANIFEST_POLLS {
        let st = match connection.get_status() {
            Ok(st) => st,
            // device left the bus to apply the image
            Err(err) if !intf.descriptor().manifestation_tolerant() => {
                debug!("No status after manifestation: {err}");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        thread::sleep(st.poll_duration());
        st.ok()?;
        match st.state {
            DfuState::ManifestSync | DfuState::Manifest => {
                thread::sleep(MANIFEST_POLL_INTERVAL)
            }
            DfuState::DfuIdle | DfuState::ManifestWaitReset => {
                info!("Manifestation done ({})", st.state);
                return Ok(());
            }
            got => {
                return Err(DfuError::UnexpectedState {
                    expected: DfuState::DfuIdle,
                    got,
                });
            }
        }
    }
    Err(DfuError::Timeout)
}

/// Read back up to `length` bytes, stopping at the first short block
pub fn upload<T: ControlTransport>(
    connection: &DfuConnection<T>,
    transfer_size: u16,
    length: usize,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>, DfuError> {
    if transfer_size == 0 {
        return Err(ConfigError::TransferSizeUnspecified.into());
    }
    let mut data: Vec<u8> = Vec::with_capacity(length);
    let mut block_nr: u16 = 0;

    while data.len() < length {
        let request = (length - data.len()).min(transfer_size as usize) as u16;
        let block = connection.upload(block_nr, request)?;
        let short = block.len() < request as usize;
        data.extend(block);
        block_nr = block_nr.wrapping_add(1);
        progress.progress(data.len(), length);
        if short {
            break;
        }
    }
    Ok(data)
}
