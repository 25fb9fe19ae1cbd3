//! Main crate

use std::fs::File;

use dfu::{
    ChunkedDownload, DfuError, FlashConfig, Flasher, NusbEnumerator,
    ProgressSink,
};

#[cxx::bridge]
mod ffi {

    struct FlashProgress {
        /// 0 to 100
        percent: i32,
        /// 0 while running, 1 on success, -1 on failure
        finished: i32,
    }

    extern "Rust" {
        type FlashSession;

        #[Self = "FlashSession"]
        fn with_defaults() -> Box<FlashSession>;

        fn with_vendor_id(&mut self, vid: u16);
        fn with_product_id(&mut self, pid: u16);
        fn with_serial(&mut self, serial: &str);
        fn with_transfer_size(&mut self, size: u16);
        fn flash_file(&mut self, filename: &str) -> Result<()>;
        fn progress(&self) -> FlashProgress;

        fn dfu_state_to_string(state: u8) -> String;
        fn dfu_status_to_string(status: u8) -> String;
    }
}

pub struct FlashSession {
    config: FlashConfig,
    progress: SessionProgress,
}

#[derive(Default)]
struct SessionProgress {
    percent: i32,
    finished: i32,
}

impl ProgressSink for SessionProgress {
    fn progress(&mut self, done: usize, total: usize) {
        self.percent = ((100 * done) / total.max(1)) as i32;
    }

    fn finished(&mut self, result: Result<(), &DfuError>) {
        self.finished = if result.is_ok() { 1 } else { -1 };
    }
}

impl FlashSession {
    fn with_defaults() -> Box<FlashSession> {
        Box::new(FlashSession {
            config: FlashConfig::default(),
            progress: SessionProgress::default(),
        })
    }

    fn with_vendor_id(&mut self, vid: u16) {
        self.config.criteria.vendor.replace(vid);
    }

    fn with_product_id(&mut self, pid: u16) {
        self.config.criteria.product.replace(pid);
    }

    fn with_serial(&mut self, serial: &str) {
        self.config.criteria.serial.replace(serial.into());
    }

    fn with_transfer_size(&mut self, size: u16) {
        self.config.transfer_size.replace(size);
    }

    fn flash_file(&mut self, filename: &str) -> Result<(), DfuError> {
        self.progress = SessionProgress::default();
        let source = match File::open(filename) {
            Ok(source) => source,
            Err(err) => {
                let err = DfuError::File(err.into());
                self.progress.finished(Err(&err));
                return Err(err);
            }
        };
        let mut flasher = Flasher::new(
            self.config.clone(),
            NusbEnumerator::new(self.config.timeout),
            ChunkedDownload,
        );
        flasher.flash(source, &mut self.progress)
    }

    fn progress(&self) -> ffi::FlashProgress {
        ffi::FlashProgress {
            percent: self.progress.percent,
            finished: self.progress.finished,
        }
    }
}

fn dfu_state_to_string(state: u8) -> String {
    dfu::state_to_string(state).unwrap_or_default().into()
}

fn dfu_status_to_string(status: u8) -> String {
    dfu::status_to_string(status).into()
}
