use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::flow_instructions::InstructionHeader;
use super::flow_match::Match;
use super::ports::{PortNo, PortNumber, GROUP_ANY, NO_BUFFER};

use super::super::err::*;

/// Length of the fixed part of a flow mod body, up to the match.
pub const FLOW_MOD_LEN: usize = 40;

#[derive(Debug, PartialEq, Clone)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: PortNumber,
    pub out_group: u32,
    pub flags: FlowModFlags,
    //pad 2 bytes
    pub mmatch: Match,
    pub instructions: Vec<InstructionHeader>,
}

impl FlowMod {
    /// A permanent flow added to table 0 with the given `priority`, `mmatch`
    /// and `instructions`.
    pub fn add_flow(priority: u16, mmatch: Match, instructions: Vec<InstructionHeader>) -> Self {
        FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: FlowModCommand::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: priority,
            buffer_id: NO_BUFFER,
            out_port: PortNumber::Reserved(PortNo::Any),
            out_group: GROUP_ANY,
            flags: FlowModFlags::empty(),
            mmatch: mmatch,
            instructions: instructions,
        }
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.cookie_mask)?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u8(self.command.to_u8().unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(self.idle_timeout)?;
        bytes.write_u16::<BigEndian>(self.hard_timeout)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u32::<BigEndian>(self.buffer_id)?;
        bytes.write_u32::<BigEndian>(self.out_port.into())?;
        bytes.write_u32::<BigEndian>(self.out_group)?;
        bytes.write_u16::<BigEndian>(self.flags.bits())?;
        bytes.write_u16::<BigEndian>(0)?; // pad 2 bytes
        self.mmatch.marshal(bytes)?;
        for instruction in &self.instructions {
            instruction.marshal(bytes)?;
        }
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for FlowMod {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FLOW_MOD_LEN {
            bail!(ErrorKind::InvalidSliceLength(
                FLOW_MOD_LEN,
                bytes.len(),
                stringify!(FlowMod),
            ));
        }
        let mut cursor = Cursor::new(bytes);
        let cookie = cursor.read_u64::<BigEndian>()?;
        let cookie_mask = cursor.read_u64::<BigEndian>()?;
        let table_id = cursor.read_u8()?;
        let command_raw = cursor.read_u8()?;
        let command = FlowModCommand::from_u8(command_raw).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(command_raw as u64, stringify!(FlowModCommand)).into()
        })?;
        let idle_timeout = cursor.read_u16::<BigEndian>()?;
        let hard_timeout = cursor.read_u16::<BigEndian>()?;
        let priority = cursor.read_u16::<BigEndian>()?;
        let buffer_id = cursor.read_u32::<BigEndian>()?;
        let out_port = PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?;
        let out_group = cursor.read_u32::<BigEndian>()?;
        let flags = FlowModFlags::from_bits_truncate(cursor.read_u16::<BigEndian>()?);
        cursor.seek(SeekFrom::Current(2))?; // pad 2 bytes

        let mmatch_slice_len = Match::read_len(&mut cursor)?;
        let start = cursor.position() as usize;
        if start + mmatch_slice_len > bytes.len() {
            bail!(ErrorKind::InvalidSliceLength(
                mmatch_slice_len,
                bytes.len() - start,
                stringify!(Match),
            ));
        }
        let mmatch = Match::try_from(&bytes[start..start + mmatch_slice_len])?;
        let instructions = InstructionHeader::parse_sequence(&bytes[start + mmatch_slice_len..])?;

        Ok(FlowMod {
            cookie: cookie,
            cookie_mask: cookie_mask,
            table_id: table_id,
            command: command,
            idle_timeout: idle_timeout,
            hard_timeout: hard_timeout,
            priority: priority,
            buffer_id: buffer_id,
            out_port: out_port,
            out_group: out_group,
            flags: flags,
            mmatch: mmatch,
            instructions: instructions,
        })
    }
}

#[derive(Primitive, PartialEq, Debug, Clone)]
pub enum FlowModCommand {
    /// New flow.
    Add = 0,
    /// Modify all matching flows.
    Modify = 1,
    /// Modify entry strictly matching wildcards and
    /// priority.
    ModifyStrict = 2,
    /// Delete all matching flows.
    Delete = 3,
    /// Delete entry strictly matching wildcards and
    /// priority.
    DeleteStrict = 4,
}

bitflags!{
    pub struct FlowModFlags: u16 {
        /// Send flow removed message when flow
        /// expires or is deleted.
        const SEND_FLOW_REM = 1 << 0;
        /// Check for overlapping entries first.
        const CHECK_OVERLAP = 1 << 1;
        /// Reset flow packet and byte counts.
        const RESET_COUNTS = 1 << 2;
        /// Don't keep track of packet count.
        const NO_PKT_COUNTS = 1 << 3;
        /// Don't keep track of byte count.
        const NO_BYT_COUNTS = 1 << 4;
    }
}
