use std::{fs, path::PathBuf, time::Duration};

use dfu::{MatchCriteria, normalize, resolve_transfer_size, upload};

use crate::{CliError, ProgressBar, connect_dfu_device};

pub(crate) fn read_file(
    file: &PathBuf,
    criteria: &MatchCriteria,
    timeout: Duration,
    length: u32,
    transfer_size: Option<u16>,
) -> Result<(), CliError> {
    let (intf, connection) = connect_dfu_device(criteria, timeout)?;
    let transfer_size = resolve_transfer_size(&intf, transfer_size)
        .map_err(dfu::DfuError::from)?;

    normalize(&connection, dfu::DEFAULT_MAX_RECOVERY)?;

    let mut progress = ProgressBar::new("Reading");
    let data =
        upload(&connection, transfer_size, length as usize, &mut progress)?;
    println!();
    println!("Read {} bytes", data.len());
    fs::write(file, data)?;
    Ok(())
}
