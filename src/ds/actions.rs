use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::super::err::*;
use super::ports::{PortNumber, PortNo, CONTROLLER_MAX_LEN_NO_BUFFER};

use std::path;

#[derive(Primitive, Debug, PartialEq, Clone, Copy)]
pub enum ActionType {
    /// Output to switch port.
    Output = 0,
    /// Copy TTL "outwards" -- from next-to-outermost to outermost
    CopyTtlOut = 11,
    /// Copy TTL "inwards" -- from outermost to next-to-outermost
    CopyTtlIn = 12,
    /// MPLS TTL
    SetMplsTtl = 15,
    /// Decrement MPLS TTL
    DecMplsTtl = 16,
    /// Push a new VLAN tag
    PushVlan = 17,
    /// Pop the outer VLAN tag
    PopVlan = 18,
    /// Push a new MPLS tag
    PushMpls = 19,
    /// Pop the outer MPLS tag
    PopMpls = 20,
    /// Set queue id when outputting to a port
    SetQueue = 21,
    /// Apply group.
    Group = 22,
    /// IP TTL.
    SetNwTtl = 23,
    /// Decrement IP TTL.
    DecNwTtl = 24,
    /// Set a header field using OXM TLV format.
    SetField = 25,
    /// Push a new PBB service tag (I-TAG)
    PushPbb = 26,
    /// Pop the outer PBB service tag (I-TAG)
    PopPbb = 27,
    /// Experimenter action
    Experimenter = 0xffff,
}

pub fn calc_actions_len(actions: &[ActionHeader]) -> u16 {
    actions.iter().map(|action| *action.len()).sum()
}

pub const ACTION_HEADER_LEN: u16 = 4;

#[derive(Getters, Debug, PartialEq, Clone)]
pub struct ActionHeader {
    #[get = "pub"]
    ttype: ActionType,
    #[get = "pub"]
    len: u16,
    #[get = "pub"]
    payload: ActionPayload,
}

impl ActionHeader {
    /// Output action sending packets to `port`.
    pub fn output(port: PortNumber) -> Self {
        PayloadOutput {
            port: port,
            max_len: 0,
        }
        .into()
    }

    /// Output action sending whole, unbuffered packets to the controller.
    pub fn to_controller() -> Self {
        PayloadOutput {
            port: PortNumber::Reserved(PortNo::Controller),
            max_len: CONTROLLER_MAX_LEN_NO_BUFFER,
        }
        .into()
    }

    pub fn read_len(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
        // go to len position in the raw bytes
        cursor.seek(SeekFrom::Current(2))?;
        // read value and handle errors
        let len = match cursor.read_u16::<BigEndian>() {
            Ok(len) => len,
            Err(err) => {
                error!(
                    "Could not read action len.{}{:?}{}{}",
                    path::MAIN_SEPARATOR,
                    cursor,
                    path::MAIN_SEPARATOR,
                    err
                );
                bail!(ErrorKind::CouldNotReadLength(2, stringify!(ActionHeader)))
            }
        };
        // go back to start
        cursor.seek(SeekFrom::Current(-4))?;
        if len < ACTION_HEADER_LEN {
            bail!(ErrorKind::IllegalValue(len as u64, stringify!(ActionHeader)));
        }
        Ok(len as usize)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.ttype.to_u16().unwrap_or(0xffff))?;
        bytes.write_u16::<BigEndian>(self.len)?;
        self.payload.marshal(bytes)
    }

    /// Parses a sequence of actions spanning all of `bytes`.
    pub fn parse_sequence(bytes: &[u8]) -> Result<Vec<ActionHeader>> {
        let mut cursor = Cursor::new(bytes);
        let mut actions = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let action_len = ActionHeader::read_len(&mut cursor)?;
            let start = cursor.position() as usize;
            if start + action_len > bytes.len() {
                bail!(ErrorKind::InvalidSliceLength(
                    action_len,
                    bytes.len() - start,
                    stringify!(ActionHeader)
                ));
            }
            actions.push(ActionHeader::try_from(&bytes[start..start + action_len])?);
            cursor.seek(SeekFrom::Current(action_len as i64))?;
        }
        Ok(actions)
    }
}

impl<'a> TryFrom<&'a [u8]> for ActionHeader {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let raw_ttype = cursor.read_u16::<BigEndian>()?;
        let ttype = ActionType::from_u16(raw_ttype).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(raw_ttype as u64, stringify!(ActionType)).into()
        })?;
        let len = cursor.read_u16::<BigEndian>()?;
        let payload = match ttype {
            ActionType::Output => ActionPayload::Output(PayloadOutput::try_from(&bytes[4..])?),
            _ => ActionPayload::Other(bytes[4..].to_vec()),
        };
        Ok(ActionHeader {
            ttype: ttype,
            len: len,
            payload: payload,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ActionPayload {
    Output(PayloadOutput),
    /// Body of any other action type, kept as raw bytes.
    Other(Vec<u8>),
}

impl ActionPayload {
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self {
            ActionPayload::Output(payload) => payload.marshal(bytes),
            ActionPayload::Other(raw) => {
                bytes.extend_from_slice(&raw[..]);
                Ok(())
            }
        }
    }
}

pub const PAYLOAD_OUTPUT_LEN: u16 = 12;

/// Action structure for OFPAT_OUTPUT, which sends packets out 'port'.
/// When the 'port' is the OFPP_CONTROLLER, 'max_len' indicates the max
/// number of bytes to send. A 'max_len' of zero means no bytes of the
/// packet should be sent. A 'max_len' of OFPCML_NO_BUFFER means that
/// the packet is not buffered and the complete packet is to be sent to
/// the controller.
#[derive(Debug, PartialEq, Clone)]
pub struct PayloadOutput {
    pub port: PortNumber,
    pub max_len: u16,
    // pad 6 bytes
}

impl PayloadOutput {
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(self.port.into())?;
        bytes.write_u16::<BigEndian>(self.max_len)?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_u32::<BigEndian>(0)?;
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for PayloadOutput {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
        Ok(PayloadOutput {
            port: port,
            max_len: cursor.read_u16::<BigEndian>()?,
        })
        //pad 6 bytes by ignoring them
    }
}

impl From<PayloadOutput> for ActionHeader {
    fn from(payload: PayloadOutput) -> ActionHeader {
        ActionHeader {
            ttype: ActionType::Output,
            len: ACTION_HEADER_LEN + PAYLOAD_OUTPUT_LEN,
            payload: ActionPayload::Output(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_output_layout() {
        let mut bytes = Vec::new();
        ActionHeader::to_controller().marshal(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 16, 0xff, 0xff, 0xff, 0xfd, 0xff, 0xff, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn parse_sequence_keeps_order() {
        let actions = vec![
            ActionHeader::output(PortNumber::NormalPort(1)),
            ActionHeader::output(PortNumber::Reserved(PortNo::Flood)),
        ];
        let mut bytes = Vec::new();
        for action in &actions {
            action.marshal(&mut bytes).unwrap();
        }
        assert_eq!(calc_actions_len(&actions) as usize, bytes.len());
        assert_eq!(ActionHeader::parse_sequence(&bytes).unwrap(), actions);
    }

    #[test]
    fn other_actions_are_kept_raw() {
        // pop vlan, 8 bytes
        let bytes = [0, 18, 0, 8, 0, 0, 0, 0];
        let actions = ActionHeader::parse_sequence(&bytes).unwrap();
        assert_eq!(*actions[0].ttype(), ActionType::PopVlan);
        assert_eq!(actions[0].payload(), &ActionPayload::Other(vec![0, 0, 0, 0]));
    }

    #[test]
    fn overlong_action_fails() {
        let bytes = [0, 0, 0, 16, 0, 0, 0, 1];
        assert!(ActionHeader::parse_sequence(&bytes).is_err());
    }
}
