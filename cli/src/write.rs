use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
};

use dfu::{
    ChunkedDownload, DfuError, FlashConfig, Flasher, NusbEnumerator,
    ProgressSink,
};

use crate::CliError;

/// `[####    ]` style progress on stdout
pub(crate) struct ProgressBar {
    label: &'static str,
}

impl ProgressBar {
    pub(crate) fn new(label: &'static str) -> Self {
        ProgressBar { label }
    }
}

impl ProgressSink for ProgressBar {
    fn progress(&mut self, done: usize, total: usize) {
        let total = total.max(1);
        let percentage = (100 * done) / total;
        let filled = ((60 * done) / total).min(60);
        print!(
            "\r  {} {:3}% [{}]",
            self.label,
            percentage,
            "#".repeat(filled) + &" ".repeat(60 - filled)
        );
        let _ = io::stdout().flush();
    }

    fn finished(&mut self, result: Result<(), &DfuError>) {
        println!();
        if result.is_ok() {
            println!("Done!");
        }
    }
}

pub(crate) fn write_file(
    file: &PathBuf,
    config: FlashConfig,
) -> Result<(), CliError> {
    let source = File::open(file)?;
    let timeout = config.timeout;
    let mut flasher =
        Flasher::new(config, NusbEnumerator::new(timeout), ChunkedDownload);
    flasher.flash(source, &mut ProgressBar::new("Flashing"))?;
    Ok(())
}
