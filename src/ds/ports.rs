// used to allow PortNo constants
#![allow(overflowing_literals)]

use super::super::err::*;
use num_traits::{FromPrimitive, ToPrimitive};
use std::convert::TryFrom;
use std::fmt;

/// Buffer id telling the switch that a packet is not buffered.
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Wildcard group used in flow mods that do not filter by group.
pub const GROUP_ANY: u32 = 0xffff_ffff;

/// `max_len` of an output action asking the switch to send the
/// complete packet to the controller without buffering it.
pub const CONTROLLER_MAX_LEN_NO_BUFFER: u16 = 0xffff;

/// Either a reserved OpenFlow port or a physical/logical switch port.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum PortNumber {
    Reserved(PortNo),
    NormalPort(u32),
}

impl TryFrom<u32> for PortNumber {
    type Error = Error;
    fn try_from(port_no: u32) -> Result<Self> {
        if port_no == 0 {
            bail!(ErrorKind::IllegalValue(0, stringify!(PortNumber)));
        }
        Ok(match PortNo::from_u32(port_no) {
            Some(port) => PortNumber::Reserved(port),
            None => PortNumber::NormalPort(port_no),
        })
    }
}

impl From<PortNumber> for u32 {
    fn from(port: PortNumber) -> u32 {
        match port {
            // every variant has a u32 discriminant
            PortNumber::Reserved(port_no) => port_no.to_u32().unwrap_or(PortNo::Any as u32),
            PortNumber::NormalPort(port_no) => port_no,
        }
    }
}

impl fmt::Debug for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortNumber::Reserved(port_no) => write!(f, "{:?}", port_no),
            PortNumber::NormalPort(port_no) => write!(f, "{}", port_no),
        }
    }
}

/// Port numbering. Ports are numbered starting from 1.
#[derive(Primitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum PortNo {
    /* Maximum number of physical and logical switch ports. */
    Max = 0xffffff00,
    /* Reserved OpenFlow Port (fake output "ports"). */
    /// Send the packet out the input port. This
    /// reserved port must be explicitly used
    /// in order to send back out of the input
    /// port.
    InPort = 0xfffffff8,
    /// Submit the packet to the first flow table
    /// NB: This destination port can only be
    /// used in packet-out messages.
    Table = 0xfffffff9,
    /// Process with normal L2/L3 switching.
    Normal = 0xfffffffa,
    /// All physical ports in VLAN, except input
    /// port and those blocked or link down.
    Flood = 0xfffffffb,
    /// All physical ports except input port.
    All = 0xfffffffc,
    /// Send to controller.
    Controller = 0xfffffffd,
    /// Local openflow "port".
    Local = 0xfffffffe,
    /// Wildcard port used only for flow mod
    /// (delete) and flow stats requests. Selects
    /// all flows regardless of output port
    /// (including flows with no output port).
    Any = 0xffffffff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_and_normal_ports() {
        assert_eq!(
            PortNumber::try_from(0xfffffffb).unwrap(),
            PortNumber::Reserved(PortNo::Flood)
        );
        assert_eq!(PortNumber::try_from(3).unwrap(), PortNumber::NormalPort(3));
        assert_eq!(u32::from(PortNumber::Reserved(PortNo::Controller)), 0xfffffffd);
    }

    #[test]
    fn port_zero_is_illegal() {
        assert!(PortNumber::try_from(0).is_err());
    }
}
