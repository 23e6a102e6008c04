use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::Cursor;

use super::flow_match::Match;
use super::ports::NO_BUFFER;

use super::super::err::*;

/// Length of the fixed part of a packet in body, up to the match.
pub const PACKET_IN_LEN: usize = 16;

#[derive(Debug, PartialEq, Clone)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: InReason,
    pub table_id: u8,
    pub cookie: u64,
    pub mmatch: Match,
    //pad 2 bytes
    pub ethernet_frame: Vec<u8>,
}

impl PacketIn {
    /// Whether the switch kept the packet in one of its buffers.
    pub fn is_buffered(&self) -> bool {
        self.buffer_id != NO_BUFFER
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(self.buffer_id)?;
        bytes.write_u16::<BigEndian>(self.total_len)?;
        bytes.write_u8(self.reason.to_u8().unwrap_or(0))?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        self.mmatch.marshal(bytes)?;
        bytes.write_u16::<BigEndian>(0)?; //pad 2 bytes
        bytes.extend_from_slice(&self.ethernet_frame[..]);
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for PacketIn {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < PACKET_IN_LEN {
            bail!(ErrorKind::InvalidSliceLength(
                PACKET_IN_LEN,
                bytes.len(),
                stringify!(PacketIn),
            ));
        }
        let mut cursor = Cursor::new(bytes);
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let total_len = cursor.read_u16::<BigEndian>()?;
        let reason_raw = cursor.read_u8()?;
        let reason = InReason::from_u8(reason_raw).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(reason_raw as u64, stringify!(InReason)).into()
        })?;
        let table_id = cursor.read_u8()?;
        let cookie = cursor.read_u64::<BigEndian>()?;

        let mmatch_slice_len = Match::read_len(&mut cursor)?;
        let start = cursor.position() as usize;
        // match is followed by 2 bytes padding
        let frame_start = start + mmatch_slice_len + 2;
        if frame_start > bytes.len() {
            bail!(ErrorKind::InvalidSliceLength(
                mmatch_slice_len + 2,
                bytes.len() - start,
                stringify!(Match),
            ));
        }
        let mmatch = Match::try_from(&bytes[start..start + mmatch_slice_len])?;
        let ethernet_frame = Vec::from(&bytes[frame_start..]);

        Ok(PacketIn {
            buffer_id: buffer_id,
            total_len: total_len,
            reason: reason,
            table_id: table_id,
            cookie: cookie,
            mmatch: mmatch,
            ethernet_frame: ethernet_frame,
        })
    }
}

/// Why is this packet being sent to the controller?
#[derive(Primitive, PartialEq, Debug, Clone)]
pub enum InReason {
    /// No matching flow (table-miss flow entry).
    NoMatch = 0,
    /// Action explicitly output to controller.
    Action = 1,
    /// Packet has invalid TTL
    InvalidTtl = 2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::flow_match::MatchPayload;
    use super::super::ports::PortNumber;

    fn sample(buffer_id: u32) -> PacketIn {
        PacketIn {
            buffer_id: buffer_id,
            total_len: 14,
            reason: InReason::NoMatch,
            table_id: 0,
            cookie: 0,
            mmatch: Match::all().with(MatchPayload::InPort(PortNumber::NormalPort(1))),
            ethernet_frame: vec![0xbb; 6]
                .into_iter()
                .chain(vec![0xaa; 6])
                .chain(vec![0x08, 0x00])
                .collect(),
        }
    }

    #[test]
    fn parse_keeps_frame_and_in_port() {
        let packet_in = sample(NO_BUFFER);
        let mut bytes = Vec::new();
        packet_in.marshal(&mut bytes).unwrap();
        // 16 fixed + 16 match + 2 pad + 14 frame
        assert_eq!(bytes.len(), 48);

        let parsed = PacketIn::try_from(&bytes[..]).unwrap();
        assert_eq!(parsed.mmatch.in_port(), Some(PortNumber::NormalPort(1)));
        assert_eq!(parsed.ethernet_frame.len(), 14);
        assert!(!parsed.is_buffered());
        assert_eq!(parsed, packet_in);
    }

    #[test]
    fn buffered_packet_in() {
        assert!(sample(42).is_buffered());
    }

    #[test]
    fn unknown_reason_fails() {
        let mut bytes = Vec::new();
        sample(NO_BUFFER).marshal(&mut bytes).unwrap();
        bytes[6] = 9;
        assert!(PacketIn::try_from(&bytes[..]).is_err());
    }
}
