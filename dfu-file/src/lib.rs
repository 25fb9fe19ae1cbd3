//! DFU firmware file containers
//!
//! A firmware file is a raw payload optionally followed by the DFU suffix
//! (DFU 1.1 appendix B) and optionally preceded by a TI "LMDFU" prefix.

use std::io::{self, Read};

use crc::{CRC_32_JAMCRC, Crc};
use thiserror::Error;

pub use prefix::*;

mod prefix;

pub const DFU_SUFFIX_LEN: usize = 16;
pub const DFU_SUFFIX_SIGNATURE: &[u8; 3] = b"UFD";
pub const DFU_VERSION: u16 = 0x0100;
pub const WILDCARD_ID: u16 = 0xffff;

/// CRC-32 of the DFU suffix: reflected, initial value all ones, no final xor
pub const DFU_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_JAMCRC);

#[derive(Error, Debug)]
pub enum DfuFileError {
    #[error("Cannot read firmware file: {0}")]
    Io(#[from] io::Error),

    #[error("DFU suffix length {0} is invalid")]
    SuffixLength(u8),

    #[error(
        "DFU suffix CRC mismatch: file says {expected:#010x}, \
         computed {computed:#010x}"
    )]
    Crc { expected: u32, computed: u32 },

    #[error("Firmware payload is empty")]
    Empty,
}

/// Trailing DFU suffix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DfuSuffix {
    pub bcd_device: u16,
    pub product_id: u16,
    pub vendor_id: u16,
    pub bcd_dfu: u16,
    /// `bLength`, size of the suffix including any vendor extension
    pub length: u8,
    pub crc: u32,
}

/// Firmware image handed to the download engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfuFile {
    payload: Vec<u8>,
    prefix: Option<LmdfuPrefix>,
    suffix: Option<DfuSuffix>,
}

impl DfuFile {
    /// Image with a fresh suffix for the given ids
    pub fn new(vendor_id: u16, product_id: u16, payload: Vec<u8>) -> Self {
        DfuFile {
            payload,
            prefix: None,
            suffix: Some(DfuSuffix {
                bcd_device: WILDCARD_ID,
                product_id,
                vendor_id,
                bcd_dfu: DFU_VERSION,
                length: DFU_SUFFIX_LEN as u8,
                crc: 0,
            }),
        }
    }

    /// Raw image without a suffix, matching any device
    pub fn from_payload(payload: Vec<u8>) -> Self {
        DfuFile {
            payload,
            prefix: None,
            suffix: None,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, DfuFileError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::decode(&data)
    }

    /// Split a file into prefix, payload and suffix. A file without the
    /// suffix signature is taken as a plain binary.
    pub fn decode(data: &[u8]) -> Result<Self, DfuFileError> {
        let (body, suffix) = if has_suffix(data) {
            let suffix = decode_suffix(data)?;
            (&data[..data.len() - suffix.length as usize], Some(suffix))
        } else {
            (data, None)
        };

        let (payload, prefix) = match LmdfuPrefix::decode(body) {
            Some(prefix) => (&body[LMDFU_PREFIX_LEN..], Some(prefix)),
            None => (body, None),
        };

        if payload.is_empty() {
            return Err(DfuFileError::Empty);
        }

        Ok(DfuFile {
            payload: payload.to_vec(),
            prefix,
            suffix,
        })
    }

    /// Serialize prefix, payload and a suffix carrying a freshly computed CRC
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(
            LMDFU_PREFIX_LEN + self.payload.len() + DFU_SUFFIX_LEN,
        );
        if let Some(prefix) = &self.prefix {
            data.extend(prefix.encode());
        }
        data.extend(&self.payload);
        if let Some(suffix) = &self.suffix {
            data.extend(suffix.bcd_device.to_le_bytes());
            data.extend(suffix.product_id.to_le_bytes());
            data.extend(suffix.vendor_id.to_le_bytes());
            data.extend(suffix.bcd_dfu.to_le_bytes());
            data.extend(DFU_SUFFIX_SIGNATURE);
            data.push(DFU_SUFFIX_LEN as u8);
            let crc = DFU_CRC.checksum(&data);
            data.extend(crc.to_le_bytes());
        }
        data
    }

    pub fn with_prefix(mut self, prefix: LmdfuPrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Declared vendor id, [WILDCARD_ID] without a suffix
    pub fn vendor_id(&self) -> u16 {
        self.suffix.map_or(WILDCARD_ID, |s| s.vendor_id)
    }

    /// Declared product id, [WILDCARD_ID] without a suffix
    pub fn product_id(&self) -> u16 {
        self.suffix.map_or(WILDCARD_ID, |s| s.product_id)
    }

    pub fn bcd_device(&self) -> u16 {
        self.suffix.map_or(WILDCARD_ID, |s| s.bcd_device)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn suffix(&self) -> Option<&DfuSuffix> {
        self.suffix.as_ref()
    }

    pub fn prefix(&self) -> Option<&LmdfuPrefix> {
        self.prefix.as_ref()
    }
}

pub fn has_suffix(data: &[u8]) -> bool {
    data.len() >= DFU_SUFFIX_LEN && {
        let sig = &data[data.len() - 8..data.len() - 5];
        sig == DFU_SUFFIX_SIGNATURE
    }
}

fn decode_suffix(data: &[u8]) -> Result<DfuSuffix, DfuFileError> {
    let end = data.len();
    let length = data[end - 5];
    if (length as usize) < DFU_SUFFIX_LEN || length as usize > end {
        return Err(DfuFileError::SuffixLength(length));
    }

    let expected = extract_u32(data, end - 4);
    let computed = DFU_CRC.checksum(&data[..end - 4]);
    if expected != computed {
        return Err(DfuFileError::Crc { expected, computed });
    }

    Ok(DfuSuffix {
        bcd_device: extract_u16(data, end - 16),
        product_id: extract_u16(data, end - 14),
        vendor_id: extract_u16(data, end - 12),
        bcd_dfu: extract_u16(data, end - 10),
        length,
        crc: expected,
    })
}

fn extract_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn extract_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_check_value() {
        // CRC-32/JAMCRC of "123456789"
        assert_eq!(DFU_CRC.checksum(b"123456789"), 0x340bc6d9);
    }

    #[test]
    fn test_suffix_layout() {
        let data = DfuFile::new(0x0483, 0xdf11, vec![0xaa, 0xbb]).to_bytes();
        assert_eq!(data.len(), 2 + DFU_SUFFIX_LEN);
        assert_eq!(&data[2..4], &[0xff, 0xff]);
        assert_eq!(&data[4..6], &[0x11, 0xdf]);
        assert_eq!(&data[6..8], &[0x83, 0x04]);
        assert_eq!(&data[8..10], &[0x00, 0x01]);
        assert_eq!(&data[10..13], b"UFD");
        assert_eq!(data[13], 16);
        assert!(has_suffix(&data));
    }

    #[test]
    fn test_decode_suffixed_file() {
        let data = DfuFile::new(0x1d50, 0x6089, vec![1, 2, 3]).to_bytes();
        let file = DfuFile::decode(&data).unwrap();
        assert_eq!(file.vendor_id(), 0x1d50);
        assert_eq!(file.product_id(), 0x6089);
        assert_eq!(file.payload(), &[1, 2, 3]);
        assert_eq!(file.size(), 3);
        assert!(file.prefix().is_none());
    }

    #[test]
    fn test_plain_binary() {
        let file = DfuFile::decode(&[0x20, 0x00, 0x01, 0x08]).unwrap();
        assert_eq!(file.vendor_id(), WILDCARD_ID);
        assert_eq!(file.product_id(), WILDCARD_ID);
        assert!(file.suffix().is_none());
        assert_eq!(file.size(), 4);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut data = DfuFile::new(0x0483, 0xdf11, vec![1, 2, 3]).to_bytes();
        data[1] = 0x42;
        assert!(matches!(
            DfuFile::decode(&data),
            Err(DfuFileError::Crc { .. })
        ));
    }

    #[test]
    fn test_bad_suffix_length() {
        let mut data = DfuFile::new(0x0483, 0xdf11, vec![1, 2, 3]).to_bytes();
        let len = data.len();
        data[len - 5] = 8;
        assert!(matches!(
            DfuFile::decode(&data),
            Err(DfuFileError::SuffixLength(8))
        ));
    }

    #[test]
    fn test_empty_payload() {
        let data = DfuFile::new(0x0483, 0xdf11, vec![]).to_bytes();
        assert!(matches!(DfuFile::decode(&data), Err(DfuFileError::Empty)));
    }

    #[test]
    fn test_from_reader() {
        let data = DfuFile::new(0x0483, 0xdf11, vec![9; 32]).to_bytes();
        let file = DfuFile::from_reader(data.as_slice()).unwrap();
        assert_eq!(file.payload(), &[9; 32]);
    }
}
