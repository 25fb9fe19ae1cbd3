use dfu::{DfuInterface, MatchCriteria, find_dfu_devices};

use crate::CliError;

pub(crate) fn list_dfu_devices(
    criteria: &MatchCriteria,
) -> Result<(), CliError> {
    let interfaces =
        find_dfu_devices(criteria).map_err(dfu::DfuError::Enumerate)?;
    if interfaces.is_empty() {
        println!("No DFU device found");
    } else {
        print_interfaces(&interfaces);
    }
    Ok(())
}

fn print_interfaces(interfaces: &[DfuInterface]) {
    for intf in interfaces {
        println!(
            "Found {}: {}",
            if intf.is_dfu_mode() { "DFU" } else { "Runtime" },
            intf
        );
        let desc = intf.descriptor();
        println!(
            "    transfer size {}, detach timeout {} ms, ({}{}{}{})",
            desc.transfer_size(),
            desc.detach_timeout(),
            if desc.can_download() { "download " } else { "" },
            if desc.can_upload() { "upload " } else { "" },
            if desc.manifestation_tolerant() {
                "manifestation-tolerant "
            } else {
                ""
            },
            if desc.will_detach() { "will-detach" } else { "" },
        );
    }
}
