pub const LMDFU_PREFIX_LEN: usize = 8;

const LMDFU_MARKER: [u8; 2] = [0x01, 0x00];
const LMDFU_ADDRESS_UNIT: u32 = 1024;

/// TI Stellaris "LMDFU" download prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LmdfuPrefix {
    /// Flash address, a multiple of 1 KiB
    pub address: u32,
    /// Payload length following the prefix
    pub length: u32,
}

impl LmdfuPrefix {
    pub fn new(address: u32, length: u32) -> Self {
        LmdfuPrefix { address, length }
    }

    /// Recognize a prefix whose length field covers exactly the rest of `data`
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() <= LMDFU_PREFIX_LEN || data[0..2] != LMDFU_MARKER {
            return None;
        }
        let address =
            u16::from_le_bytes([data[2], data[3]]) as u32 * LMDFU_ADDRESS_UNIT;
        let length = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if length as usize != data.len() - LMDFU_PREFIX_LEN {
            return None;
        }
        Some(LmdfuPrefix { address, length })
    }

    pub fn encode(&self) -> [u8; LMDFU_PREFIX_LEN] {
        let block = ((self.address / LMDFU_ADDRESS_UNIT) as u16).to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            LMDFU_MARKER[0],
            LMDFU_MARKER[1],
            block[0],
            block[1],
            length[0],
            length[1],
            length[2],
            length[3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_prefix_stripped() {
        let payload = vec![0x5a; 12];
        let data = DfuFile::new(0x1cbe, 0x00ff, payload.clone())
            .with_prefix(LmdfuPrefix::new(0x2800, 12))
            .to_bytes();
        let file = DfuFile::decode(&data).unwrap();
        assert_eq!(file.prefix(), Some(&LmdfuPrefix::new(0x2800, 12)));
        assert_eq!(file.payload(), payload.as_slice());
    }

    #[test]
    fn test_no_prefix_when_length_differs() {
        let data = [0x01, 0x00, 0x0a, 0x00, 0x40, 0x00, 0x00, 0x00, 0xff];
        assert_eq!(LmdfuPrefix::decode(&data), None);
        assert_eq!(DfuFile::decode(&data).unwrap().size(), data.len());
    }
}
