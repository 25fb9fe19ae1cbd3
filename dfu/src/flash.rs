use std::{io::Read, thread};

use dfu_file::DfuFile;
use log::{info, warn};

use crate::{
    ConfigError, DfuConnection, DfuError, DfuInterface, DfuState, DfuStatus,
    FlashConfig, MatchCriteria, WILDCARD_ID,
    device::DeviceEnumerator,
    download::{DownloadEngine, ProgressSink},
    request::ControlTransport,
};

/// One flashing session against a single device
///
/// Owns its configuration; the only change made to it is adopting the ids
/// declared by the firmware file when vendor / product were left unset.
pub struct Flasher<E: DeviceEnumerator, D: DownloadEngine> {
    config: FlashConfig,
    enumerator: E,
    engine: D,
}

impl<E: DeviceEnumerator, D: DownloadEngine> Flasher<E, D> {
    pub fn new(config: FlashConfig, enumerator: E, engine: D) -> Self {
        Flasher {
            config,
            enumerator,
            engine,
        }
    }

    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Load a firmware file and download it to the matching device
    ///
    /// `progress` receives the outcome exactly once through
    /// [ProgressSink::finished]. The device is released on every path.
    pub fn flash<R: Read>(
        &mut self,
        source: R,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), DfuError> {
        let result = self.try_flash(source, progress);
        match &result {
            Ok(()) => info!("Download done"),
            Err(err) => warn!("Download failed: {err}"),
        }
        progress.finished(result.as_ref().map(|_| ()));
        result
    }

    fn try_flash<R: Read>(
        &mut self,
        source: R,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), DfuError> {
        let file = DfuFile::from_reader(source)?;
        self.config
            .criteria
            .adopt_file_ids(file.vendor_id(), file.product_id());

        let intf = resolve_interface(&self.enumerator, &self.config.criteria)?;
        check_file_ids(&file, &intf)?;
        let transfer_size =
            resolve_transfer_size(&intf, self.config.transfer_size)?;

        let handle = self.enumerator.open(&intf)?;
        let connection = DfuConnection::new(
            handle,
            intf.interface(),
            intf.quirks(),
            self.config.timeout,
        );

        normalize(&connection, self.config.max_recovery)?;
        self.engine
            .download(&connection, &intf, transfer_size, &file, progress)
            .map_err(|err| DfuError::Download(Box::new(err)))
    }
}

/// The single interface matching `criteria`
///
/// Several matches are refused: a bus reset during the transfer may
/// renumber the device and they could no longer be told apart.
pub fn resolve_interface<E: DeviceEnumerator>(
    enumerator: &E,
    criteria: &MatchCriteria,
) -> Result<DfuInterface, DfuError> {
    let mut matches =
        enumerator.find(criteria).map_err(DfuError::Enumerate)?;
    match matches.len() {
        0 => Err(ConfigError::NoDevice.into()),
        1 => Ok(matches.remove(0)),
        count => Err(ConfigError::Ambiguous { count }.into()),
    }
}

fn check_file_ids(
    file: &DfuFile,
    intf: &DfuInterface,
) -> Result<(), ConfigError> {
    let vendor_ok = file.vendor_id() == WILDCARD_ID
        || file.vendor_id() == intf.vendor_id();
    let product_ok = file.product_id() == WILDCARD_ID
        || file.product_id() == intf.product_id();
    if vendor_ok && product_ok {
        Ok(())
    } else {
        Err(ConfigError::IdMismatch {
            file_vendor: file.vendor_id(),
            file_product: file.product_id(),
            device_vendor: intf.vendor_id(),
            device_product: intf.product_id(),
        })
    }
}

/// `wTransferSize` of the device, or `fallback` when it advertises none,
/// never below the control endpoint packet size
pub fn resolve_transfer_size(
    intf: &DfuInterface,
    fallback: Option<u16>,
) -> Result<u16, ConfigError> {
    let size = match intf.descriptor().transfer_size() {
        0 => fallback
            .filter(|size| *size > 0)
            .ok_or(ConfigError::TransferSizeUnspecified)?,
        size => size,
    };
    Ok(size.max(intf.max_packet_size() as u16))
}

/// Bring the device to `dfuIDLE`
///
/// Clears error states and aborts stale transfers, at most `max_recovery`
/// times in total. Transitional download / manifest states are left to the
/// download engine. A non-OK status once idle gets one CLRSTATUS, anything
/// left after that is only logged.
pub fn normalize<T: ControlTransport>(
    connection: &DfuConnection<T>,
    max_recovery: u32,
) -> Result<DfuStatus, DfuError> {
    let mut recoveries: u32 = 0;
    let mut st = loop {
        let st = connection.get_status()?;
        thread::sleep(st.poll_duration());
        info!("Determining device status: {st}");

        match st.state {
            state if state.is_runtime() => {
                return Err(DfuError::RuntimeMode { state });
            }
            DfuState::DfuError
            | DfuState::DnloadIdle
            | DfuState::UploadIdle => {
                if recoveries >= max_recovery {
                    return Err(DfuError::LoopGuard {
                        state: st.state,
                        retries: recoveries,
                    });
                }
                recoveries += 1;
                if st.state == DfuState::DfuError {
                    info!("Clearing status");
                    connection.clear_status()?;
                } else {
                    info!("Aborting previous incomplete transfer");
                    connection.abort()?;
                }
            }
            _ => break st,
        }
    };

    if !st.is_ok() {
        warn!("Status not OK ({}), clearing", st.status);
        connection.clear_status()?;
        st = connection.get_status()?;
        if !st.is_ok() {
            warn!("Status still not OK: {}", st.status);
        }
        thread::sleep(st.poll_duration());
    }
    Ok(st)
}
