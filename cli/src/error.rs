use std::{fmt::Display, io};

use dfu::{DfuError, DfuFileError};

pub enum CliError {
    IO(io::Error),
    Dfu(DfuError),
    File(DfuFileError),
}

impl From<io::Error> for CliError {
    fn from(value: io::Error) -> Self {
        CliError::IO(value)
    }
}

impl From<DfuError> for CliError {
    fn from(value: DfuError) -> Self {
        CliError::Dfu(value)
    }
}

impl From<DfuFileError> for CliError {
    fn from(value: DfuFileError) -> Self {
        CliError::File(value)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::IO(err) => write!(f, "IO error: {err}"),
            CliError::Dfu(err) => write!(f, "DFU error: {err}"),
            CliError::File(err) => write!(f, "{err}"),
        }
    }
}
