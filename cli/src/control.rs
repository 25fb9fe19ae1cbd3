use std::time::Duration;

use dfu::{MatchCriteria, status_to_string};

use crate::{CliError, connect_dfu_device};

pub(crate) fn detach_cmd(
    criteria: &MatchCriteria,
    timeout: Duration,
    wait: u16,
) -> Result<(), CliError> {
    let (_intf, connection) = connect_dfu_device(criteria, timeout)?;
    println!("Detaching, device has {wait} ms to see a USB reset...");
    connection.detach(wait).map_err(dfu::DfuError::from)?;
    Ok(())
}

pub(crate) fn abort_cmd(
    criteria: &MatchCriteria,
    timeout: Duration,
) -> Result<(), CliError> {
    let (_intf, connection) = connect_dfu_device(criteria, timeout)?;
    let status = connection.abort_to_idle()?;
    println!("{status}");
    Ok(())
}

pub(crate) fn status_cmd(
    criteria: &MatchCriteria,
    timeout: Duration,
) -> Result<(), CliError> {
    let (_intf, connection) = connect_dfu_device(criteria, timeout)?;
    let status = connection.get_status().map_err(dfu::DfuError::from)?;
    println!("{status}");
    println!("poll timeout: {} ms", status.poll_timeout);
    if status.string_index != 0 {
        println!("vendor string index: {}", status.string_index);
    }
    if !status.is_ok() {
        println!("{}", status_to_string(status.status.code()));
    }
    Ok(())
}
