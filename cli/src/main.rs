use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{Args, Parser, Subcommand};
use clap_num::maybe_hex;
use env_logger::Env;
use parse_size::parse_size;
use regex::Regex;

use dfu::{
    DeviceEnumerator, DfuConnection, DfuError, DfuInterface, FlashConfig,
    MatchCriteria, NusbEnumerator, resolve_interface,
};
use control::*;
use error::CliError;
use file::*;
use list::*;
use read::*;
use write::*;

mod control;
mod error;
mod file;
mod list;
mod read;
mod write;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// more output, repeat for more (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// USB control transfer timeout in milliseconds
    #[clap(short = 'T', long, default_value_t = 5000, global = true)]
    timeout: u64,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Device selection, unset options match anything
#[derive(Args, Clone, Default)]
struct DeviceArgs {
    /// vendor ID (ex: "0483")
    #[clap(long, value_parser=hex_u16)]
    vendor: Option<u16>,
    /// product ID (ex: "df11")
    #[clap(long, value_parser=hex_u16)]
    product: Option<u16>,
    /// vendor ID while in DFU mode
    #[clap(long, value_parser=hex_u16)]
    vendor_dfu: Option<u16>,
    /// product ID while in DFU mode
    #[clap(long, value_parser=hex_u16)]
    product_dfu: Option<u16>,
    /// serial number
    #[clap(short = 'S', long)]
    serial: Option<String>,
    /// serial number while in DFU mode
    #[clap(long)]
    serial_dfu: Option<String>,
    /// bus path (ex: "1-2.3")
    #[clap(short, long, value_parser=bus_path)]
    path: Option<String>,
    /// configuration value
    #[clap(short, long, value_parser=maybe_hex::<u8>)]
    cfg: Option<u8>,
    /// interface number
    #[clap(short, long, value_parser=maybe_hex::<u8>)]
    intf: Option<u8>,
    /// alternate setting number
    #[clap(short, long, value_parser=maybe_hex::<u8>)]
    alt: Option<u8>,
    /// alternate setting name (ex: "@Internal Flash  /0x08000000/04*016Kg")
    #[clap(long)]
    alt_name: Option<String>,
    /// device number on its bus
    #[clap(short = 'n', long)]
    devnum: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// list DFU devices
    List {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// write a firmware file to the device
    Write {
        /// firmware file, with or without DFU suffix
        file: PathBuf,
        #[command(flatten)]
        device: DeviceArgs,
        /// transfer size if the device does not report one (ex: 1K)
        #[clap(short, long, value_parser=parse_transfer_size)]
        transfer_size: Option<u16>,
    },
    /// read the device memory into a file
    Read {
        /// file to write
        file: PathBuf,
        #[command(flatten)]
        device: DeviceArgs,
        /// maximum length to read (ex: 64K, 2MB)
        #[clap(short, long, value_parser=parse_length)]
        length: u32,
        /// transfer size if the device does not report one (ex: 1K)
        #[clap(short, long, value_parser=parse_transfer_size)]
        transfer_size: Option<u16>,
    },
    /// ask a runtime device to switch to DFU mode
    Detach {
        #[command(flatten)]
        device: DeviceArgs,
        /// milliseconds the device waits for the USB reset
        #[clap(long, default_value_t = 1000)]
        wait: u16,
    },
    /// abort any transfer and check the device is idle
    Abort {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// show the device status
    Status {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// inspect a firmware file
    File {
        /// firmware file
        file: PathBuf,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::List {
            device: DeviceArgs::default(),
        }
    }
}

impl DeviceArgs {
    fn criteria(&self) -> MatchCriteria {
        MatchCriteria {
            vendor: self.vendor,
            product: self.product,
            vendor_dfu: self.vendor_dfu,
            product_dfu: self.product_dfu,
            serial: self.serial.clone(),
            serial_dfu: self.serial_dfu.clone(),
            path: self.path.clone(),
            config: self.cfg,
            interface: self.intf,
            alt_setting: self.alt,
            alt_name: self.alt_name.clone(),
            devnum: self.devnum,
        }
    }
}

fn hex_u16(s: &str) -> Result<u16, String> {
    <u16>::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("{e}"))
}

fn bus_path(s: &str) -> Result<String, String> {
    let r = Regex::new(r"^[0-9A-Za-z]+-\d+(\.\d+)*$")
        .map_err(|e| format!("{e}"))?;
    if r.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(format!("invalid bus path \"{s}\", expected BUS-PORT[.PORT...]"))
    }
}

fn parse_length(s: &str) -> Result<u32, String> {
    let len = parse_size(s).map_err(|e| format!("{e}"))?;
    len.try_into().map_err(|e| format!("{e}"))
}

fn parse_transfer_size(s: &str) -> Result<u16, String> {
    let len = parse_size(s).map_err(|e| format!("{e}"))?;
    len.try_into().map_err(|e| format!("{e}"))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let timeout = Duration::from_millis(cli.timeout);

    if let Err(err) = match &cli.command.unwrap_or_default() {
        Commands::List { device } => list_dfu_devices(&device.criteria()),
        Commands::Write {
            file,
            device,
            transfer_size,
        } => write_file(
            file,
            FlashConfig {
                timeout,
                transfer_size: *transfer_size,
                criteria: device.criteria(),
                ..Default::default()
            },
        ),
        Commands::Read {
            file,
            device,
            length,
            transfer_size,
        } => read_file(
            file,
            &device.criteria(),
            timeout,
            *length,
            *transfer_size,
        ),
        Commands::Detach { device, wait } => {
            detach_cmd(&device.criteria(), timeout, *wait)
        }
        Commands::Abort { device } => abort_cmd(&device.criteria(), timeout),
        Commands::Status { device } => status_cmd(&device.criteria(), timeout),
        Commands::File { file } => show_file(file),
    } {
        eprintln!("Error: {err}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Exactly one matching interface, opened
fn connect_dfu_device(
    criteria: &MatchCriteria,
    timeout: Duration,
) -> Result<(DfuInterface, DfuConnection<nusb::Interface>), CliError> {
    let enumerator = NusbEnumerator::new(timeout);
    let intf = resolve_interface(&enumerator, criteria)?;
    println!("Opening DFU capable USB device...");
    println!("{intf}");
    let handle = enumerator.open(&intf).map_err(DfuError::from)?;
    let connection =
        DfuConnection::new(handle, intf.interface(), intf.quirks(), timeout);
    Ok((intf, connection))
}
