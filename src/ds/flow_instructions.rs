use super::super::err::*;
use super::actions::{calc_actions_len, ActionHeader};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use std::path;

/// Length of an instruction header including the 4 padding bytes
/// that precede the action list of action instructions.
pub const INSTRUCTION_ACTIONS_HEADER_LEN: u16 = 8;

#[derive(Primitive, Debug, PartialEq, Clone, Copy)]
pub enum InstructionType {
    /// Setup the next table in the lookup pipeline
    GotoTable = 1,
    /// Setup the metadata field for use later in pipeline
    WriteMetadata = 2,
    /// Write the action(s) onto the datapath action set
    WriteActions = 3,
    /// Applies the action(s) immediately
    ApplyActions = 4,
    /// Clears all actions from the datapath
    /// action set
    ClearActions = 5,
    /// Apply meter (rate limiter)
    Meter = 6,
    /// Experimenter instruction
    Experimenter = 0xFFFF,
}

#[derive(Getters, Debug, PartialEq, Clone)]
pub struct InstructionHeader {
    #[get = "pub"]
    ttype: InstructionType,
    /// Length of this struct in bytes.
    #[get = "pub"]
    len: u16,
    #[get = "pub"]
    payload: InstructionPayload,
}

impl InstructionHeader {
    /// Instruction applying `actions` immediately.
    pub fn apply_actions(actions: Vec<ActionHeader>) -> Self {
        InstructionHeader {
            ttype: InstructionType::ApplyActions,
            len: INSTRUCTION_ACTIONS_HEADER_LEN + calc_actions_len(&actions),
            payload: InstructionPayload::ApplyActions(actions),
        }
    }

    pub fn read_len(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
        cursor.seek(SeekFrom::Current(2))?; //skip to length
        let len = cursor.read_u16::<BigEndian>().chain_err(|| {
            let err_msg = format!(
                "Could not read InstructionHeader length!{}Cursor: {:?}",
                path::MAIN_SEPARATOR,
                cursor
            );
            error!("{}", err_msg);
            err_msg
        })?;
        cursor.seek(SeekFrom::Current(-4))?;
        if len < 4 {
            bail!(ErrorKind::IllegalValue(len as u64, stringify!(InstructionHeader)));
        }
        Ok(len as usize)
    }

    /// Parses instructions until `bytes` is exhausted.
    pub fn parse_sequence(bytes: &[u8]) -> Result<Vec<InstructionHeader>> {
        let mut cursor = Cursor::new(bytes);
        let mut instructions = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let instruction_len = InstructionHeader::read_len(&mut cursor)?;
            let start = cursor.position() as usize;
            if start + instruction_len > bytes.len() {
                bail!(ErrorKind::InvalidSliceLength(
                    instruction_len,
                    bytes.len() - start,
                    stringify!(InstructionHeader)
                ));
            }
            instructions.push(InstructionHeader::try_from(
                &bytes[start..start + instruction_len],
            )?);
            cursor.seek(SeekFrom::Current(instruction_len as i64))?;
        }
        Ok(instructions)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.ttype.to_u16().unwrap_or(0xffff))?;
        bytes.write_u16::<BigEndian>(self.len)?;
        match self.payload {
            InstructionPayload::GotoTable(table_id) => {
                bytes.write_u8(table_id)?;
                bytes.write_u8(0)?; // pad 1 byte
                bytes.write_u16::<BigEndian>(0)?; // pad 2 bytes
            }
            InstructionPayload::WriteActions(ref actions)
            | InstructionPayload::ApplyActions(ref actions) => {
                bytes.write_u32::<BigEndian>(0)?; // pad 4 bytes
                for action in actions {
                    action.marshal(bytes)?;
                }
            }
            InstructionPayload::ClearActions => {
                bytes.write_u32::<BigEndian>(0)?; // pad 4 bytes
            }
            InstructionPayload::Other(ref raw) => bytes.extend_from_slice(&raw[..]),
        }
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for InstructionHeader {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let raw_ttype = cursor.read_u16::<BigEndian>().chain_err(|| {
            let err_msg = format!(
                "Could not read InstructionHeader raw_ttype!{}Cursor: {:?}",
                path::MAIN_SEPARATOR,
                cursor
            );
            error!("{}", err_msg);
            err_msg
        })?;
        let ttype = InstructionType::from_u16(raw_ttype).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(raw_ttype as u64, stringify!(InstructionType)).into()
        })?;
        let length = cursor.read_u16::<BigEndian>()?;
        let payload_slice = &bytes[4..];

        let payload = match ttype {
            InstructionType::GotoTable => InstructionPayload::GotoTable(cursor.read_u8()?),
            InstructionType::WriteActions => InstructionPayload::WriteActions(
                ActionHeader::parse_sequence(actions_slice(payload_slice)?)?,
            ),
            InstructionType::ApplyActions => InstructionPayload::ApplyActions(
                ActionHeader::parse_sequence(actions_slice(payload_slice)?)?,
            ),
            InstructionType::ClearActions => InstructionPayload::ClearActions,
            _ => InstructionPayload::Other(payload_slice.to_vec()),
        };

        Ok(InstructionHeader {
            ttype: ttype,
            len: length,
            payload: payload,
        })
    }
}

/// Skips the 4 padding bytes in front of an action list.
fn actions_slice(payload: &[u8]) -> Result<&[u8]> {
    if payload.len() < 4 {
        bail!(ErrorKind::InvalidSliceLength(
            4,
            payload.len(),
            stringify!(InstructionPayload)
        ));
    }
    Ok(&payload[4..])
}

#[derive(Debug, PartialEq, Clone)]
pub enum InstructionPayload {
    GotoTable(u8),
    WriteActions(Vec<ActionHeader>),
    ApplyActions(Vec<ActionHeader>),
    ClearActions,
    /// Body of metadata, meter and experimenter instructions.
    Other(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::ports::PortNumber;

    #[test]
    fn apply_actions_layout() {
        let instruction =
            InstructionHeader::apply_actions(vec![ActionHeader::output(PortNumber::NormalPort(1))]);
        assert_eq!(*instruction.len(), 24);
        let mut bytes = Vec::new();
        instruction.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..8], &[0, 4, 0, 24, 0, 0, 0, 0]);
        assert_eq!(InstructionHeader::parse_sequence(&bytes).unwrap(), vec![instruction]);
    }

    #[test]
    fn goto_and_clear_parse() {
        let bytes = [0, 1, 0, 8, 3, 0, 0, 0, 0, 5, 0, 8, 0, 0, 0, 0];
        let instructions = InstructionHeader::parse_sequence(&bytes).unwrap();
        assert_eq!(instructions[0].payload(), &InstructionPayload::GotoTable(3));
        assert_eq!(instructions[1].payload(), &InstructionPayload::ClearActions);
    }

    #[test]
    fn zero_length_instruction_fails() {
        let bytes = [0, 4, 0, 0, 0, 0, 0, 0];
        assert!(InstructionHeader::parse_sequence(&bytes).is_err());
    }
}
