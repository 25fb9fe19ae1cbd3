//! Host side of the USB Device Firmware Upgrade (DFU) protocol based on [`nusb`]
//!
//! Provides the six DFU class requests, GETSTATUS decoding with per-device
//! quirks, and a [Flasher] that brings a device from whatever state it is
//! left in to `dfuIDLE`, negotiates the transfer size and hands the firmware
//! to a [DownloadEngine].
//!
//! Useful references:
//! - DFU: [USB Device Firmware Upgrade Specification, Revision 1.1](https://www.usb.org/sites/default/files/DFU_1.1.pdf)
//!
//! # Example
//!
//! Flashing a file with a DFU suffix onto the only matching device:
//! ```no_run
//! use std::fs::File;
//! use dfu::{
//!     ChunkedDownload, FlashConfig, Flasher, NoProgress, NusbEnumerator,
//! };
//!
//! let mut flasher = Flasher::new(
//!     FlashConfig::default(),
//!     NusbEnumerator::default(),
//!     ChunkedDownload,
//! );
//! match File::open("firmware.dfu") {
//!     Ok(file) => match flasher.flash(file, &mut NoProgress) {
//!         Ok(()) => println!("Done"),
//!         Err(e) => println!("Error: {e}"),
//!     },
//!     Err(e) => println!("Error: {e}"),
//! }
//! ```
//!
//! [`nusb`]: https://docs.rs/nusb

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000u64);

mod config;
mod connection;
mod descriptor;
mod device;
pub mod diagnostic;
mod download;
mod error;
mod flash;
mod interface;
#[cfg(test)]
mod mock;
mod quirks;
mod request;
mod state;
mod status;

use std::time::Duration;

// Re-exports
pub use config::{DEFAULT_MAX_RECOVERY, FlashConfig, MatchCriteria, WILDCARD_ID};
pub use connection::DfuConnection;
pub use descriptor::DfuDescriptor;
pub use device::{DeviceEnumerator, NusbEnumerator, find_dfu_devices};
pub use diagnostic::{state_to_string, status_to_string};
pub use download::{
    ChunkedDownload, DownloadEngine, NoProgress, ProgressSink, upload,
};
pub use error::{ConfigError, DfuError, TransportError};
pub use flash::{
    Flasher, normalize, resolve_interface, resolve_transfer_size,
};
pub use interface::DfuInterface;
pub use quirks::{DEFAULT_POLL_TIMEOUT, Quirks};
pub use request::{ControlTransport, DfuRequest};
pub use state::DfuState;
pub use status::{DfuStatus, DfuStatusCode, ShortStatus};

pub use dfu_file::{DfuFile, DfuFileError};
