use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::super::err::*;

/// Length of the features reply body in bytes.
pub const SWITCH_FEATURES_LEN: usize = 24;

/// Body of the features reply a switch sends during the handshake.
#[derive(Debug, PartialEq, Clone)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: u8,
    //pad 2 bytes
    pub capabilities: Capabilities,
    pub reserved: u32,
}

impl SwitchFeatures {
    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.datapath_id)?;
        bytes.write_u32::<BigEndian>(self.n_buffers)?;
        bytes.write_u8(self.n_tables)?;
        bytes.write_u8(self.auxiliary_id)?;
        bytes.write_u16::<BigEndian>(0)?; //pad 2 bytes
        bytes.write_u32::<BigEndian>(self.capabilities.bits())?;
        bytes.write_u32::<BigEndian>(self.reserved)?;
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for SwitchFeatures {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < SWITCH_FEATURES_LEN {
            bail!(ErrorKind::InvalidSliceLength(
                SWITCH_FEATURES_LEN,
                bytes.len(),
                stringify!(SwitchFeatures),
            ));
        }
        let mut cursor = Cursor::new(bytes);

        let datapath_id = cursor.read_u64::<BigEndian>()?;
        let n_buffers = cursor.read_u32::<BigEndian>()?;
        let n_tables = cursor.read_u8()?;
        let auxiliary_id = cursor.read_u8()?;
        cursor.seek(SeekFrom::Current(2))?; // pad 2 bytes
        // unknown capability bits are dropped
        let capabilities = Capabilities::from_bits_truncate(cursor.read_u32::<BigEndian>()?);
        let reserved = cursor.read_u32::<BigEndian>()?;

        Ok(SwitchFeatures {
            datapath_id: datapath_id,
            n_buffers: n_buffers,
            n_tables: n_tables,
            auxiliary_id: auxiliary_id,
            capabilities: capabilities,
            reserved: reserved,
        })
    }
}

bitflags!{
    /* Capabilities supported by the datapath. */
    pub struct Capabilities: u32 {
        /// Flow statistics.
        const FLOW_STATS = 1 << 0;
        /// Table statistics.
        const TABLE_STATS = 1 << 1;
        /// Port statistics.
        const PORT_STATS = 1 << 2;
        /// Group statistics.
        const GROUP_STATS = 1 << 3;
        /// Can reassemble IP fragments.
        const IP_REASM = 1 << 5;
        /// Queue statistics.
        const QUEUE_STATS = 1 << 6;
        /// Switch will block looping ports.
        const PORT_BLOCKED = 1 << 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_features_reply() {
        let bytes = [
            0, 0, 0, 0, 0, 0, 0, 1, // datapath id
            0, 0, 1, 0, // n_buffers
            254, 0, 0, 0, // n_tables, auxiliary id, pad
            0, 0, 0, 0x47, // flow, table, port and queue stats
            0, 0, 0, 0,
        ];
        let features = SwitchFeatures::try_from(&bytes[..]).unwrap();
        assert_eq!(features.datapath_id, 1);
        assert_eq!(features.n_buffers, 256);
        assert_eq!(features.n_tables, 254);
        assert!(features.capabilities.contains(Capabilities::FLOW_STATS));
        assert!(features.capabilities.contains(Capabilities::QUEUE_STATS));
        assert!(!features.capabilities.contains(Capabilities::GROUP_STATS));
    }

    #[test]
    fn short_features_reply_fails() {
        assert!(SwitchFeatures::try_from(&[0u8; 10][..]).is_err());
    }
}
