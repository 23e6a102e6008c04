use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::actions::{calc_actions_len, ActionHeader};
use super::ports::PortNumber;

use super::super::err::*;

pub const PACKET_OUT_LEN: usize = 16;

#[derive(Debug, PartialEq, Clone)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: PortNumber,
    pub actions_len: u16,
    //pad 6 bytes
    pub actions: Vec<ActionHeader>,
    pub data: Vec<u8>,
}

impl PacketOut {
    pub fn new(
        buffer_id: u32,
        in_port: PortNumber,
        actions: Vec<ActionHeader>,
        data: Vec<u8>,
    ) -> Self {
        PacketOut {
            buffer_id: buffer_id,
            in_port: in_port,
            actions_len: calc_actions_len(&actions),
            actions: actions,
            data: data,
        }
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(self.buffer_id)?;
        bytes.write_u32::<BigEndian>(self.in_port.into())?;
        bytes.write_u16::<BigEndian>(self.actions_len)?;
        //pad 6 bytes
        bytes.write_u32::<BigEndian>(0)?;
        bytes.write_u16::<BigEndian>(0)?;
        for action in &self.actions {
            action.marshal(bytes)?;
        }
        bytes.extend_from_slice(&self.data[..]);
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for PacketOut {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < PACKET_OUT_LEN {
            bail!(ErrorKind::InvalidSliceLength(
                PACKET_OUT_LEN,
                bytes.len(),
                stringify!(PacketOut),
            ));
        }
        let mut cursor = Cursor::new(bytes);
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let in_port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
        let actions_len = cursor.read_u16::<BigEndian>()?;
        cursor.seek(SeekFrom::Start(PACKET_OUT_LEN as u64))?;

        let actions_end = PACKET_OUT_LEN + actions_len as usize;
        if actions_end > bytes.len() {
            bail!(ErrorKind::InvalidSliceLength(
                actions_len as usize,
                bytes.len() - PACKET_OUT_LEN,
                stringify!(ActionHeader),
            ));
        }
        let actions = ActionHeader::parse_sequence(&bytes[PACKET_OUT_LEN..actions_end])?;
        let data = Vec::from(&bytes[actions_end..]);

        Ok(PacketOut {
            buffer_id: buffer_id,
            in_port: in_port,
            actions_len: actions_len,
            actions: actions,
            data: data,
        })
    }
}
