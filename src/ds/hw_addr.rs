use std::fmt;
use std::str::FromStr;

use super::super::err::*;

/// length of ethernet address in bytes (6)
pub const ETHERNET_ADDRESS_LENGTH: usize = 6;

/// 48 bit ethernet (MAC) address.
///
/// Displays in the canonical lowercase `aa:bb:cc:dd:ee:ff` form,
/// parsing accepts either case.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct EthernetAddress(pub [u8; ETHERNET_ADDRESS_LENGTH]);

impl EthernetAddress {
    pub const BROADCAST: EthernetAddress = EthernetAddress([0xff; ETHERNET_ADDRESS_LENGTH]);

    pub fn octets(&self) -> [u8; ETHERNET_ADDRESS_LENGTH] {
        self.0
    }
}

pub fn from_slice_eth(slice: &[u8]) -> Result<EthernetAddress> {
    if slice.len() < ETHERNET_ADDRESS_LENGTH {
        bail!(ErrorKind::InvalidSliceLength(
            ETHERNET_ADDRESS_LENGTH,
            slice.len(),
            stringify!(EthernetAddress),
        ));
    }
    let mut addr = [0u8; ETHERNET_ADDRESS_LENGTH];
    addr.copy_from_slice(&slice[..ETHERNET_ADDRESS_LENGTH]);
    Ok(EthernetAddress(addr))
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for EthernetAddress {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut addr = [0u8; ETHERNET_ADDRESS_LENGTH];
        let mut count = 0;
        for part in s.split(|c| c == ':' || c == '-') {
            if count == ETHERNET_ADDRESS_LENGTH || part.len() != 2 {
                bail!(ErrorKind::InvalidSliceLength(
                    ETHERNET_ADDRESS_LENGTH,
                    count + 1,
                    stringify!(EthernetAddress),
                ));
            }
            addr[count] = u8::from_str_radix(part, 16).chain_err(|| {
                let err_msg = format!("Could not parse octet '{}' of '{}'", part, s);
                error!("{}", err_msg);
                err_msg
            })?;
            count += 1;
        }
        if count != ETHERNET_ADDRESS_LENGTH {
            bail!(ErrorKind::InvalidSliceLength(
                ETHERNET_ADDRESS_LENGTH,
                count,
                stringify!(EthernetAddress),
            ));
        }
        Ok(EthernetAddress(addr))
    }
}

impl From<[u8; ETHERNET_ADDRESS_LENGTH]> for EthernetAddress {
    fn from(addr: [u8; ETHERNET_ADDRESS_LENGTH]) -> Self {
        EthernetAddress(addr)
    }
}
