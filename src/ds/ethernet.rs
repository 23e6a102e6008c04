use byteorder::{BigEndian, ReadBytesExt};
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom};

use super::hw_addr::{self, EthernetAddress};

use super::super::err::*;

/// Length of an untagged ethernet header in bytes.
pub const ETHERNET_HEADER_LENGTH: usize = 14;

/// Ethertype announcing an 802.1Q tag.
pub const ETH_TYPE_VLAN: u16 = 0x8100;

/// Link layer header of a frame carried in a packet in.
#[derive(Debug, PartialEq, Clone)]
pub struct EthernetFrame {
    pub dl_dst: EthernetAddress,
    pub dl_src: EthernetAddress,
    pub dl_vlan: Option<u16>,
    pub dl_vlan_pcp: u8,
    pub eth_type: u16,
}

impl<'a> TryFrom<&'a [u8]> for EthernetFrame {
    type Error = Error;
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < ETHERNET_HEADER_LENGTH {
            bail!(ErrorKind::TruncatedFrame(bytes.len()));
        }
        let dl_dst = hw_addr::from_slice_eth(&bytes[0..6])?;
        let dl_src = hw_addr::from_slice_eth(&bytes[6..12])?;
        let mut cursor = Cursor::new(bytes);
        cursor.seek(SeekFrom::Start(12))?;
        let typ = cursor.read_u16::<BigEndian>()?;
        // a tag that is cut off still leaves the addresses usable
        let (dl_vlan, dl_vlan_pcp, eth_type) = if typ == ETH_TYPE_VLAN && bytes.len() >= 18 {
            let tag_and_pcp = cursor.read_u16::<BigEndian>()?;
            let eth_type = cursor.read_u16::<BigEndian>()?;
            (Some(tag_and_pcp & 0xfff), (tag_and_pcp >> 13) as u8, eth_type)
        } else {
            (None, 0, typ)
        };
        Ok(EthernetFrame {
            dl_dst: dl_dst,
            dl_src: dl_src,
            dl_vlan: dl_vlan,
            dl_vlan_pcp: dl_vlan_pcp,
            eth_type: eth_type,
        })
    }
}
