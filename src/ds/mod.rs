use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::io::Cursor;

use super::err::*;
use std::path;

pub mod actions;
pub mod ethernet;
pub mod features;
pub mod flow_instructions;
pub mod flow_match;
pub mod flow_mod;
pub mod hw_addr;
pub mod packet_in;
pub mod packet_out;
pub mod ports;

/// defines an OpenFlow message
/// header + payload
#[derive(Getters, Debug, PartialEq, Clone)]
pub struct OfMsg {
    #[get = "pub"]
    header: Header,
    #[get = "pub"]
    payload: OfPayload,
}

impl OfMsg {
    pub fn new(header: Header, payload: OfPayload) -> Self {
        OfMsg {
            header: header,
            payload: payload,
        }
    }

    /// Wraps `payload` in an OpenFlow 1.3 header with transaction id `xid`.
    pub fn generate(xid: u32, payload: OfPayload) -> Result<Self> {
        let mut body = Vec::new();
        payload.marshal(&mut body)?;
        let length = HEADER_LENGTH + body.len();
        if length > ::std::u16::MAX as usize {
            bail!(ErrorKind::IllegalValue(length as u64, stringify!(OfMsg)));
        }
        Ok(OfMsg {
            header: Header::new(Version::V1_3, payload.ttype(), length as u16, xid),
            payload: payload,
        })
    }

    /// Parses the body following an already decoded `header`.
    pub fn parse(header: Header, body: &[u8]) -> Result<Self> {
        let payload = OfPayload::parse(header.ttype(), body)?;
        Ok(OfMsg::new(header, payload))
    }

    pub fn into_payload(self) -> OfPayload {
        self.payload
    }

    /// Serializes header and payload. The length field is taken from the
    /// marshaled payload, not from the stored header.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.payload.marshal(&mut body)?;
        let header = Header {
            length: (HEADER_LENGTH + body.len()) as u16,
            ..self.header.clone()
        };
        let mut bytes = Vec::with_capacity(HEADER_LENGTH + body.len());
        header.marshal(&mut bytes)?;
        bytes.extend_from_slice(&body[..]);
        Ok(bytes)
    }
}

/// OpenFlow message header length is 8 bytes.
pub const HEADER_LENGTH: usize = 8;

/// OpenFlow header struct.
#[derive(Getters, Debug, PartialEq, Clone)]
pub struct Header {
    /// OpenFlow version identifier
    #[get = "pub"]
    version: Version,
    /// OpenFlow message  type
    #[get = "pub"]
    ttype: Type,
    /// length of message including this header
    #[get = "pub"]
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    #[get = "pub"]
    xid: u32,
}

/// Implementation of OpenFlow header struct
impl Header {
    pub fn new(version: Version, ttype: Type, length: u16, xid: u32) -> Self {
        Header {
            version: version,
            ttype: ttype,
            length: length,
            xid: xid,
        }
    }

    /// returns the length of the payload in bytes
    /// equivalent to the length in the header - HEADER_LENGTH
    pub fn payload_length(&self) -> u16 {
        // self.length is length of whole message including header length
        // therefore subtract the constant length of an OpenFlow header
        // to get the payload length in bytes
        self.length.saturating_sub(HEADER_LENGTH as u16)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(self.version.to_u8().unwrap_or(0))?;
        bytes.write_u8(self.ttype.to_u8().unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(self.length)?;
        bytes.write_u32::<BigEndian>(self.xid)?;
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for Header {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        // check if bytes have correct length
        if bytes.len() != HEADER_LENGTH {
            bail!(ErrorKind::InvalidSliceLength(
                HEADER_LENGTH,
                bytes.len(),
                stringify!(Header),
            ));
        }
        let mut cursor = Cursor::new(bytes);

        let version_raw = cursor.read_u8().chain_err(|| {
            let err_msg = format!(
                "Could not read header version!{}Cursor: {:?}",
                path::MAIN_SEPARATOR,
                cursor
            );
            error!("{}", err_msg);
            err_msg
        })?;
        let version = Version::from_u8(version_raw).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(version_raw as u64, stringify!(Version)).into()
        })?;

        let ttype_raw = cursor.read_u8()?;
        let ttype = Type::from_u8(ttype_raw).ok_or_else::<Error, _>(|| {
            ErrorKind::UnknownValue(ttype_raw as u64, stringify!(Type)).into()
        })?;

        let length = cursor.read_u16::<BigEndian>()?;
        if (length as usize) < HEADER_LENGTH {
            bail!(ErrorKind::IllegalValue(length as u64, stringify!(Header)));
        }

        // build result
        Ok(Header {
            version: version,
            ttype: ttype,
            length: length,
            xid: cursor.read_u32::<BigEndian>()?,
        })
    }
}

/// OpenFlow Version enum.
#[derive(Primitive, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum Version {
    /// indicates OpenFlow version 1.0
    V1_0 = 0x01,
    /// indicates OpenFlow version 1.1
    V1_1 = 0x02,
    /// indicates OpenFlow version 1.2
    V1_2 = 0x03,
    /// indicates OpenFlow version 1.3
    V1_3 = 0x04,
    /// indicates OpenFlow version 1.4
    V1_4 = 0x05,
    /// indicates OpenFlow version 1.5
    V1_5 = 0x06,
}

/// Enum of OpenFlow message types.
#[derive(Primitive, PartialEq, Debug, Clone, Copy)]
pub enum Type {
    /* Immutable messages. */
    /// Hello message sent by switch and controller
    /// directly after establishing a connection.
    /// Symmetric message.
    Hello = 0,
    /// Symmetric message
    ErrorMsg = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,
    /// Symmetric message
    Experimenter = 4,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,
    /// Controller/switch message
    GetConfigRequest = 7,
    /// Controller/switch message
    GetConfigReply = 8,
    /// Controller/switch message
    SetConfig = 9,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,
    /// Controller/switch message
    GroupMod = 15,
    /// Controller/switch message
    PortMod = 16,
    /// Controller/switch message
    TableMod = 17,

    /* Multipart messages. */
    /// Controller/switch message
    MultipartRequest = 18,
    /// Controller/switch message
    MultipartReply = 19,

    /* Barrier messages. */
    /// Controller/switch message
    BarrierRequest = 20,
    /// Controller/switch message
    BarrierReply = 21,

    /* Queue Configuration messages. */
    /// Controller/switch message
    QueueGetConfigRequest = 22,
    /// Controller/switch message
    QueueGetConfigReply = 23,
    /* Controller role change request messages. */
    /// Controller/switch message
    RoleRequest = 24,
    /// Controller/switch message
    RoleReply = 25,

    /* Asynchronous message configuration.  */
    /// Controller/switch message
    GetAsyncRequest = 26,
    /// Controller/switch message
    GetAsyncReply = 27,
    /// Controller/switch message
    SetAsync = 28,

    /* Meters and rate limiters configuration messages. */
    /// Controller/switch message
    MeterMod = 29,
}

/// Error type of a failed hello negotiation.
pub const ERROR_TYPE_HELLO_FAILED: u16 = 0;
/// No compatible version.
pub const HELLO_FAILED_INCOMPATIBLE: u16 = 0;

/// Body of an OpenFlow error message.
#[derive(Debug, PartialEq, Clone)]
pub struct ErrorMsg {
    pub ttype: u16,
    pub code: u16,
    /// At least the first 64 bytes of the failed request,
    /// or an ASCII text for hello failures.
    pub data: Vec<u8>,
}

impl<'a> TryFrom<&'a [u8]> for ErrorMsg {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let ttype = cursor.read_u16::<BigEndian>()?;
        let code = cursor.read_u16::<BigEndian>()?;
        Ok(ErrorMsg {
            ttype: ttype,
            code: code,
            data: Vec::from(&bytes[4..]),
        })
    }
}

/// Payloads of the messages this controller exchanges with switches.
#[derive(Debug, PartialEq, Clone)]
pub enum OfPayload {
    Hello,
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),

    FeaturesRequest,
    FeaturesReply(features::SwitchFeatures),

    PacketIn(packet_in::PacketIn),
    PacketOut(packet_out::PacketOut),
    FlowMod(flow_mod::FlowMod),

    /// Any other message type, body kept as raw bytes.
    Unparsed(Type, Vec<u8>),
}

impl OfPayload {
    /// OpenFlow message type of this payload.
    pub fn ttype(&self) -> Type {
        match self {
            OfPayload::Hello => Type::Hello,
            OfPayload::Error(_) => Type::ErrorMsg,
            OfPayload::EchoRequest(_) => Type::EchoRequest,
            OfPayload::EchoReply(_) => Type::EchoReply,
            OfPayload::FeaturesRequest => Type::FeaturesRequest,
            OfPayload::FeaturesReply(_) => Type::FeaturesReply,
            OfPayload::PacketIn(_) => Type::PacketIn,
            OfPayload::PacketOut(_) => Type::PacketOut,
            OfPayload::FlowMod(_) => Type::FlowMod,
            OfPayload::Unparsed(ttype, _) => *ttype,
        }
    }

    pub fn parse(ttype: &Type, bytes: &[u8]) -> Result<Self> {
        Ok(match ttype {
            // hello elements are not needed to negotiate 1.3
            Type::Hello => OfPayload::Hello,
            Type::ErrorMsg => OfPayload::Error(ErrorMsg::try_from(bytes)?),
            Type::EchoRequest => OfPayload::EchoRequest(bytes.to_vec()),
            Type::EchoReply => OfPayload::EchoReply(bytes.to_vec()),
            Type::FeaturesRequest => OfPayload::FeaturesRequest,
            Type::FeaturesReply => {
                OfPayload::FeaturesReply(features::SwitchFeatures::try_from(bytes)?)
            }
            Type::PacketIn => OfPayload::PacketIn(packet_in::PacketIn::try_from(bytes)?),
            Type::PacketOut => OfPayload::PacketOut(packet_out::PacketOut::try_from(bytes)?),
            Type::FlowMod => OfPayload::FlowMod(flow_mod::FlowMod::try_from(bytes)?),
            ttype => OfPayload::Unparsed(*ttype, bytes.to_vec()),
        })
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self {
            OfPayload::Hello | OfPayload::FeaturesRequest => (), // no body
            OfPayload::Error(err) => {
                bytes.write_u16::<BigEndian>(err.ttype)?;
                bytes.write_u16::<BigEndian>(err.code)?;
                bytes.extend_from_slice(&err.data[..]);
            }
            OfPayload::EchoRequest(data) | OfPayload::EchoReply(data) => {
                bytes.extend_from_slice(&data[..])
            }
            OfPayload::FeaturesReply(features) => features.marshal(bytes)?,
            OfPayload::PacketIn(packet_in) => packet_in.marshal(bytes)?,
            OfPayload::PacketOut(packet_out) => packet_out.marshal(bytes)?,
            OfPayload::FlowMod(flow_mod) => flow_mod.marshal(bytes)?,
            OfPayload::Unparsed(_, raw) => bytes.extend_from_slice(&raw[..]),
        }
        Ok(())
    }
}
