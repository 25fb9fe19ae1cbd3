use std::{fs, path::PathBuf};

use dfu::{DfuFile, WILDCARD_ID};

use crate::CliError;

fn id_string(id: u16) -> String {
    if id == WILDCARD_ID {
        "any".into()
    } else {
        format!("{id:04x}")
    }
}

pub(crate) fn show_file(file: &PathBuf) -> Result<(), CliError> {
    let data = fs::read(file)?;
    let file = DfuFile::decode(&data)?;

    match file.suffix() {
        Some(suffix) => {
            println!("DFU suffix version {:04x}", suffix.bcd_dfu);
            println!(
                "Vendor: {}, Product: {}, Device: {}",
                id_string(suffix.vendor_id),
                id_string(suffix.product_id),
                id_string(file.bcd_device()),
            );
            println!("CRC: {:#010x}", suffix.crc);
        }
        None => println!("No DFU suffix, plain binary"),
    }
    if let Some(prefix) = file.prefix() {
        println!(
            "LMDFU prefix: address 0x{:08x}, {} bytes",
            prefix.address, prefix.length
        );
    }
    println!("Payload: {} bytes", file.size());
    Ok(())
}
