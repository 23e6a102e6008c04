use super::super::err::*;
use super::hw_addr::{self, EthernetAddress, ETHERNET_ADDRESS_LENGTH};
use super::ports::PortNumber;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};
use std::path;

/// Length of the match header (type + length) in bytes.
pub const MATCH_HEADER_LENGTH: usize = 4;

/// Length of an OXM TLV header in bytes.
pub const OXM_HEADER_LENGTH: usize = 4;

/// Fields to match against flows
#[derive(Debug, PartialEq, Clone)]
pub struct Match {
    ttype: MatchType,
    matches: Vec<TlvMatch>,
    /* Serialized as:
     * - type and length (excluding padding),
     * - exactly (length - 4) (possibly 0) bytes containing OXM TLVs, then
     * - exactly ((length + 7)/8*8 - length) (between 0 and 7) bytes of
     * all-zero bytes
     * In summary, ofp_match is padded as needed, to make its overall size
     * a multiple of 8, to preserve alignement in structures using it.
     */
}

impl Match {
    /// A match without any field, matching every packet.
    pub fn all() -> Self {
        Match {
            ttype: MatchType::OXM,
            matches: Vec::new(),
        }
    }

    /// Appends `payload` to the match fields.
    pub fn with(mut self, payload: MatchPayload) -> Self {
        self.matches.push(TlvMatch::new(payload));
        self
    }

    pub fn matches(&self) -> &[TlvMatch] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Length of type, length and TLV fields without trailing padding.
    pub fn length(&self) -> u16 {
        let tlvs: usize = self.matches.iter().map(|m| m.len()).sum();
        (MATCH_HEADER_LENGTH + tlvs) as u16
    }

    /// Ingress port carried by this match, if any.
    pub fn in_port(&self) -> Option<PortNumber> {
        self.matches.iter().find_map(|m| match m.payload {
            MatchPayload::InPort(port) => Some(port),
            _ => None,
        })
    }

    pub fn eth_dst(&self) -> Option<EthernetAddress> {
        self.matches.iter().find_map(|m| match m.payload {
            MatchPayload::EthDst(addr) => Some(addr),
            _ => None,
        })
    }

    pub fn eth_src(&self) -> Option<EthernetAddress> {
        self.matches.iter().find_map(|m| match m.payload {
            MatchPayload::EthSrc(addr) => Some(addr),
            _ => None,
        })
    }

    /// Reads the length of the match the cursor points at, including
    /// trailing padding. The cursor position is left unchanged.
    pub fn read_len(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
        // go to len position in the raw bytes
        cursor.seek(SeekFrom::Current(2))?;
        // read value and handle errors
        let len = match cursor.read_u16::<BigEndian>() {
            Ok(len) => len,
            Err(err) => {
                error!(
                    "Could not read match len.{}{:?}{}{}",
                    path::MAIN_SEPARATOR,
                    cursor,
                    path::MAIN_SEPARATOR,
                    err
                );
                bail!(ErrorKind::CouldNotReadLength(2, stringify!(Match)))
            }
        };
        // go back to start
        cursor.seek(SeekFrom::Current(-4))?;
        Ok(padded_len(len as usize))
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let length = self.length();
        bytes.write_u16::<BigEndian>(self.ttype.to_u16().unwrap_or(1))?;
        bytes.write_u16::<BigEndian>(length)?;
        for mmatch in &self.matches {
            mmatch.marshal(bytes)?;
        }
        let pad_bytes_count = padded_len(length as usize) - length as usize;
        for _ in 0..pad_bytes_count {
            bytes.write_u8(0)?;
        }
        Ok(())
    }
}

fn padded_len(len: usize) -> usize {
    (len + 7) / 8 * 8
}

impl<'a> TryFrom<&'a [u8]> for Match {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut matches = Vec::new();

        // read raw type val
        let ttype_raw = cursor.read_u16::<BigEndian>().chain_err(|| {
            let err_msg = format!(
                "Could not read match type!{}Cursor: {:?}",
                path::MAIN_SEPARATOR,
                cursor
            );
            error!("{}", err_msg);
            err_msg
        })?;
        // try to decode it
        let ttype = MatchType::from_u16(ttype_raw).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(ttype_raw as u64, stringify!(MatchType)).into()
        })?;
        if ttype != MatchType::OXM {
            bail!(ErrorKind::UnsupportedValue(
                ttype_raw as u64,
                stringify!(MatchType)
            ));
        }

        let length = cursor.read_u16::<BigEndian>()? as usize;
        if length < MATCH_HEADER_LENGTH || length > bytes.len() {
            bail!(ErrorKind::InvalidSliceLength(
                length,
                bytes.len(),
                stringify!(Match)
            ));
        }

        let mut bytes_remaining = length - MATCH_HEADER_LENGTH;
        while bytes_remaining > 0 {
            let tlv_header = OxmTlvHeader(cursor.read_u32::<BigEndian>()?);
            let tlv_len = tlv_header.get_length() as usize;
            let start = cursor.position() as usize;
            if bytes_remaining < OXM_HEADER_LENGTH + tlv_len || start + tlv_len > bytes.len() {
                bail!(ErrorKind::InvalidSliceLength(
                    OXM_HEADER_LENGTH + tlv_len,
                    bytes_remaining,
                    stringify!(TlvMatch)
                ));
            }
            let tlv_match = TlvMatch::try_from(tlv_header, &bytes[start..start + tlv_len])?;

            // count down by bytes read
            cursor.seek(SeekFrom::Current(tlv_len as i64))?;
            bytes_remaining -= OXM_HEADER_LENGTH + tlv_len;
            matches.push(tlv_match);
        }

        Ok(Match {
            ttype: ttype,
            matches: matches,
        })
    }
}

/// The match type indicates the match structure (set of fields that compose the
/// match) in use. The match type is placed in the type field at the beginning
/// of all match structures. The "OpenFlow Extensible Match" type corresponds
/// to OXM TLV format described below and must be supported by all OpenFlow
/// switches.
#[derive(Primitive, PartialEq, Debug, Clone)]
enum MatchType {
    /// Deprecated.
    Standard = 0,
    /// OpenFlow Extensible Match
    OXM = 1,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TlvMatch {
    pub tlv_header: OxmTlvHeader,
    payload: MatchPayload,
}

impl TlvMatch {
    /// Builds an OpenFlow basic class TLV carrying `payload`.
    pub fn new(payload: MatchPayload) -> Self {
        let mut tlv_header = OxmTlvHeader(0);
        let (field, len) = match payload {
            MatchPayload::InPort(_) => (OfbMatchFields::InPort as u32, 4),
            MatchPayload::EthDst(_) => (OfbMatchFields::EthDst as u32, ETHERNET_ADDRESS_LENGTH),
            MatchPayload::EthSrc(_) => (OfbMatchFields::EthSrc as u32, ETHERNET_ADDRESS_LENGTH),
            MatchPayload::EthType(_) => (OfbMatchFields::EthType as u32, 2),
            MatchPayload::Other(ref raw) => (0, raw.len()),
        };
        tlv_header.set_oxm_class(OxmClass::XmcOpenFlowBasic as u32);
        tlv_header.set_oxm_field(field);
        tlv_header.set_hasmask(0);
        tlv_header.set_length(len as u32);
        TlvMatch {
            tlv_header: tlv_header,
            payload: payload,
        }
    }

    pub fn payload(&self) -> &MatchPayload {
        &self.payload
    }

    /// Length of this TLV including its header.
    pub fn len(&self) -> usize {
        OXM_HEADER_LENGTH + self.tlv_header.get_length() as usize
    }

    pub fn try_from(tlv_header: OxmTlvHeader, match_slice: &[u8]) -> Result<TlvMatch> {
        let class = OxmClass::from_u32(tlv_header.get_oxm_class()).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(tlv_header.get_oxm_class() as u64, stringify!(OxmClass))
                .into()
        })?;

        // only fields of the open flow basic class without mask are decoded
        let field = if class == OxmClass::XmcOpenFlowBasic && tlv_header.get_hasmask() == 0 {
            OfbMatchFields::from_u32(tlv_header.get_oxm_field())
        } else {
            None
        };
        let payload = match field {
            Some(OfbMatchFields::InPort) => {
                let mut cursor = Cursor::new(match_slice);
                MatchPayload::InPort(PortNumber::try_from(cursor.read_u32::<BigEndian>()?)?)
            }
            Some(OfbMatchFields::EthDst) => MatchPayload::EthDst(hw_addr::from_slice_eth(match_slice)?),
            Some(OfbMatchFields::EthSrc) => MatchPayload::EthSrc(hw_addr::from_slice_eth(match_slice)?),
            Some(OfbMatchFields::EthType) => {
                let mut cursor = Cursor::new(match_slice);
                MatchPayload::EthType(cursor.read_u16::<BigEndian>()?)
            }
            _ => MatchPayload::Other(match_slice.to_vec()),
        };

        Ok(TlvMatch {
            tlv_header: tlv_header,
            payload: payload,
        })
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(self.tlv_header.0)?;
        match self.payload {
            MatchPayload::InPort(port) => bytes.write_u32::<BigEndian>(port.into())?,
            MatchPayload::EthDst(addr) | MatchPayload::EthSrc(addr) => {
                bytes.extend_from_slice(&addr.octets()[..])
            }
            MatchPayload::EthType(eth_type) => bytes.write_u16::<BigEndian>(eth_type)?,
            MatchPayload::Other(ref raw) => bytes.extend_from_slice(&raw[..]),
        }
        Ok(())
    }
}

/// Decoded value of a single OXM TLV.
#[derive(Debug, PartialEq, Clone)]
pub enum MatchPayload {
    /// Switch input port.
    InPort(PortNumber),
    /// Ethernet destination address.
    EthDst(EthernetAddress),
    /// Ethernet source address.
    EthSrc(EthernetAddress),
    /// Ethernet frame type.
    EthType(u16),
    /// Any other field, kept as raw value bytes.
    Other(Vec<u8>),
}

bitfield!{
    pub struct OxmTlvHeader(u32);
    impl Debug;

    u32;
    pub get_length, set_length: 7, 0;
    pub get_hasmask, set_hasmask: 8, 8;
    pub get_oxm_field, set_oxm_field: 15, 9;
    pub get_oxm_class, set_oxm_class: 31, 16;
}

impl Clone for OxmTlvHeader {
    fn clone(&self) -> Self {
        OxmTlvHeader(self.0)
    }
}

impl ::std::cmp::PartialEq for OxmTlvHeader {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// OXM Class IDs.
/// The high order bit differentiate reserved classes from member classes.
/// Classes 0x0000 to 0x7FFF are member classes, allocated by ONF.
/// Classes 0x8000 to 0xFFFE are reserved classes, reserved for standardisation.
#[derive(Primitive, PartialEq, Debug, Clone)]
enum OxmClass {
    /// Backward compatibility with NXM
    XmcNxm0 = 0x0000,
    /// Backward compatibility with NXM
    XmcNxm1 = 0x0001,
    /// Basic class for OpenFlow
    XmcOpenFlowBasic = 0x8000,
    /// Experimenter class
    XmcExperimenter = 0xFFFF,
}

/// OpenFlow basic class fields understood by this crate.
#[derive(Primitive, PartialEq, Debug, Clone)]
enum OfbMatchFields {
    /// Switch input port.
    InPort = 0,
    /// Ethernet destination address.
    EthDst = 3,
    /// Ethernet source address.
    EthSrc = 4,
    /// Ethernet frame type.
    EthType = 5,
}
