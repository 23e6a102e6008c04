use byteorder::{BigEndian, ByteOrder};
use std::convert::TryFrom;
use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::super::ds;
use super::super::ds::{ErrorMsg, Header, OfMsg, OfPayload, Version};
use super::super::err::*;
use super::{App, Datapath, Event};

/// Lifecycle of a switch connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SwitchState {
    Disconnected,
    /// Hello sent, waiting for hello and features reply.
    Handshaking,
    /// Features reply received, carries the datapath id.
    Active(u64),
}

/// Work resulting from a received message.
#[derive(Debug, PartialEq, Clone)]
pub enum Step {
    Send(OfMsg),
    Dispatch(Event),
    Close,
}

/// Protocol state of one switch connection, independent of the transport.
pub struct Session {
    state: SwitchState,
    next_xid: u32,
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SwitchState::Disconnected,
            next_xid: 1,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn datapath_id(&self) -> Option<u64> {
        match self.state {
            SwitchState::Active(datapath_id) => Some(datapath_id),
            _ => None,
        }
    }

    fn xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }

    /// Starts the handshake, returning the hello to send.
    pub fn open(&mut self) -> Result<OfMsg> {
        self.state = SwitchState::Handshaking;
        let xid = self.xid();
        OfMsg::generate(xid, OfPayload::Hello)
    }

    /// Ends the session, returning the datapath id if it was active.
    pub fn close(&mut self) -> Option<u64> {
        let datapath_id = self.datapath_id();
        self.state = SwitchState::Disconnected;
        datapath_id
    }

    pub fn receive(&mut self, msg: OfMsg) -> Result<Vec<Step>> {
        let xid = *msg.header().xid();
        let version = *msg.header().version();
        let steps = match (self.state, msg.into_payload()) {
            (_, OfPayload::EchoRequest(data)) => {
                vec![Step::Send(OfMsg::generate(xid, OfPayload::EchoReply(data))?)]
            }
            (SwitchState::Handshaking, OfPayload::Hello) => {
                if version < Version::V1_3 {
                    warn!("Switch speaks {:?}, closing connection.", version);
                    self.state = SwitchState::Disconnected;
                    let err = ErrorMsg {
                        ttype: ds::ERROR_TYPE_HELLO_FAILED,
                        code: ds::HELLO_FAILED_INCOMPATIBLE,
                        data: b"OpenFlow 1.3 required".to_vec(),
                    };
                    vec![
                        Step::Send(OfMsg::generate(xid, OfPayload::Error(err))?),
                        Step::Close,
                    ]
                } else {
                    debug!("Hello from switch speaking {:?}.", version);
                    let xid = self.xid();
                    vec![Step::Send(OfMsg::generate(xid, OfPayload::FeaturesRequest)?)]
                }
            }
            (SwitchState::Handshaking, OfPayload::FeaturesReply(features))
            | (SwitchState::Active(_), OfPayload::FeaturesReply(features)) => {
                info!("Switch {:016x} is active.", features.datapath_id);
                self.state = SwitchState::Active(features.datapath_id);
                vec![Step::Dispatch(Event::SwitchFeatures {
                    xid: xid,
                    features: features,
                })]
            }
            (SwitchState::Active(datapath_id), OfPayload::PacketIn(packet_in)) => {
                vec![Step::Dispatch(Event::PacketIn {
                    datapath_id: datapath_id,
                    xid: xid,
                    packet_in: packet_in,
                })]
            }
            (state, OfPayload::PacketIn(_)) => {
                warn!("Dropping packet in received in state {:?}.", state);
                vec![]
            }
            (_, OfPayload::Error(err)) => {
                warn!(
                    "Switch reported error type {} code {} for xid {}.",
                    err.ttype, err.code, xid
                );
                vec![]
            }
            (state, payload) => {
                debug!("Ignoring {:?} in state {:?}.", payload.ttype(), state);
                vec![]
            }
        };
        Ok(steps)
    }
}

/// Sending half of a switch connection.
pub struct SwitchHandle {
    peer: String,
    sender: Sender<OfMsg>,
}

impl SwitchHandle {
    pub fn new(peer: String, sender: Sender<OfMsg>) -> Self {
        SwitchHandle {
            peer: peer,
            sender: sender,
        }
    }
}

impl Datapath for SwitchHandle {
    fn send_msg(&self, msg: OfMsg) -> Result<()> {
        self.sender
            .send(msg)
            .map_err(|_| ErrorKind::ConnectionClosed(self.peer.clone()).into())
    }
}

pub fn peer_name(stream: &TcpStream) -> String {
    match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "unknown peer".to_string(),
    }
}

/// Runs the handshake and message loop of one switch until it disconnects.
pub fn serve_switch<A: App + ?Sized>(stream: TcpStream, app: Arc<A>) -> Result<()> {
    let peer = peer_name(&stream);
    stream.set_nodelay(true)?;
    let stream_out = stream.try_clone()?;
    let (send, recv) = channel::<OfMsg>();

    // start switch output thread
    info!("Starting output thread for: {}.", peer);
    let out_peer = peer.clone();
    thread::Builder::new()
        .name(format!("Switch-Out {}", peer))
        .spawn(move || write_messages(stream_out, recv, out_peer))?;

    let handle = SwitchHandle::new(peer.clone(), send);
    let mut session = Session::new();
    let mut reader = BufReader::new(stream);
    handle.send_msg(session.open()?)?;

    'read: loop {
        let msg = match read_message(&mut reader) {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(err) => {
                info!("Connection to {} ended: {}", peer, err);
                break;
            }
        };
        debug!("Read {:?} from {}.", msg.header(), peer);

        let steps = match session.receive(msg) {
            Ok(steps) => steps,
            Err(err) => {
                warn!("Could not handle message from {}: {}", peer, err);
                continue;
            }
        };
        for step in steps {
            let result = match step {
                Step::Send(msg) => handle.send_msg(msg),
                Step::Dispatch(event) => app.handle_event(&handle, event),
                Step::Close => break 'read,
            };
            if let Err(err) = result {
                match *err.kind() {
                    ErrorKind::ConnectionClosed(_) => {
                        error!("{}", err);
                        break 'read;
                    }
                    ErrorKind::TruncatedFrame(_) | ErrorKind::MissingMatchField(_) => {
                        warn!("Dropped event from {}: {}", peer, err)
                    }
                    _ => error!("Event from {} failed: {}", peer, err),
                }
            }
        }
    }

    if let Some(datapath_id) = session.close() {
        app.switch_disconnected(datapath_id);
    }
    Ok(())
}

/// Output loop: writes queued messages until the queue or the socket closes.
fn write_messages(mut stream: TcpStream, recv: Receiver<OfMsg>, peer: String) {
    for msg in recv {
        let bytes = match msg.marshal() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Could not marshal {:?} for {}: {}", msg.header().ttype(), peer, err);
                continue;
            }
        };
        debug!("Sending {:?} to: {}.", msg.header(), peer);
        if let Err(err) = stream.write_all(&bytes[..]) {
            error!("Could not write to {}: {}", peer, err);
            break;
        }
    }
    info!("Output thread for {} finished.", peer);
}

/// Reads one message from `reader`.
///
/// Returns `Ok(None)` for messages that were consumed but could not be
/// decoded; those are skipped. I/O errors, including EOF, end the connection.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<OfMsg>> {
    let mut header_bytes = [0u8; ds::HEADER_LENGTH];
    reader.read_exact(&mut header_bytes)?;
    let length = BigEndian::read_u16(&header_bytes[2..4]) as usize;
    if length < ds::HEADER_LENGTH {
        bail!(ErrorKind::IllegalValue(length as u64, stringify!(Header)));
    }
    let mut body = vec![0u8; length - ds::HEADER_LENGTH];
    reader.read_exact(&mut body)?;

    let header = match Header::try_from(&header_bytes[..]) {
        Ok(header) => header,
        Err(err) => {
            warn!("Skipping message with undecodable header: {}", err);
            return Ok(None);
        }
    };
    match OfMsg::parse(header, &body[..]) {
        Ok(msg) => Ok(Some(msg)),
        Err(err) => {
            warn!("Skipping malformed message: {}", err);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::ds::features::{Capabilities, SwitchFeatures};
    use super::super::super::ds::flow_match::{Match, MatchPayload};
    use super::super::super::ds::packet_in::{InReason, PacketIn};
    use super::super::super::ds::ports::{PortNumber, NO_BUFFER};
    use super::super::super::ds::Type;
    use std::io::Cursor;

    fn features(datapath_id: u64) -> OfMsg {
        OfMsg::generate(
            9,
            OfPayload::FeaturesReply(SwitchFeatures {
                datapath_id: datapath_id,
                n_buffers: 0,
                n_tables: 1,
                auxiliary_id: 0,
                capabilities: Capabilities::empty(),
                reserved: 0,
            }),
        )
        .unwrap()
    }

    fn packet_in() -> OfMsg {
        OfMsg::generate(
            5,
            OfPayload::PacketIn(PacketIn {
                buffer_id: NO_BUFFER,
                total_len: 14,
                reason: InReason::NoMatch,
                table_id: 0,
                cookie: 0,
                mmatch: Match::all().with(MatchPayload::InPort(PortNumber::NormalPort(1))),
                ethernet_frame: vec![0; 14],
            }),
        )
        .unwrap()
    }

    fn hello(version: Version) -> OfMsg {
        OfMsg::new(Header::new(version, Type::Hello, 8, 3), OfPayload::Hello)
    }

    fn sent_type(step: &Step) -> Type {
        match step {
            Step::Send(msg) => *msg.header().ttype(),
            other => panic!("expected send, got {:?}", other),
        }
    }

    #[test]
    fn handshake_reaches_active() {
        let mut session = Session::new();
        assert_eq!(session.state(), SwitchState::Disconnected);
        let msg = session.open().unwrap();
        assert_eq!(*msg.header().ttype(), Type::Hello);
        assert_eq!(session.state(), SwitchState::Handshaking);

        let steps = session.receive(hello(Version::V1_3)).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(sent_type(&steps[0]), Type::FeaturesRequest);

        let steps = session.receive(features(1)).unwrap();
        assert_eq!(session.state(), SwitchState::Active(1));
        match &steps[..] {
            [Step::Dispatch(Event::SwitchFeatures { features, .. })] => {
                assert_eq!(features.datapath_id, 1)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn old_versions_are_refused() {
        let mut session = Session::new();
        session.open().unwrap();
        let steps = session.receive(hello(Version::V1_0)).unwrap();
        assert_eq!(sent_type(&steps[0]), Type::ErrorMsg);
        assert_eq!(steps[1], Step::Close);
        assert_eq!(session.state(), SwitchState::Disconnected);
    }

    #[test]
    fn packet_in_before_features_is_dropped() {
        let mut session = Session::new();
        session.open().unwrap();
        assert!(session.receive(packet_in()).unwrap().is_empty());

        session.receive(features(7)).unwrap();
        match &session.receive(packet_in()).unwrap()[..] {
            [Step::Dispatch(Event::PacketIn { datapath_id, xid, .. })] => {
                assert_eq!(*datapath_id, 7);
                assert_eq!(*xid, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn echo_is_answered_in_any_state() {
        let mut session = Session::new();
        let request = OfMsg::generate(42, OfPayload::EchoRequest(vec![1, 2])).unwrap();
        match &session.receive(request).unwrap()[..] {
            [Step::Send(reply)] => {
                assert_eq!(*reply.header().xid(), 42);
                assert_eq!(reply.payload(), &OfPayload::EchoReply(vec![1, 2]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn close_reports_active_switch() {
        let mut session = Session::new();
        session.open().unwrap();
        assert_eq!(session.close(), None);
        session.open().unwrap();
        session.receive(features(3)).unwrap();
        assert_eq!(session.close(), Some(3));
        assert_eq!(session.state(), SwitchState::Disconnected);
    }

    #[test]
    fn read_message_skips_unknown_types() {
        let mut bytes = vec![0x04, 99, 0, 10, 0, 0, 0, 1, 0xaa, 0xbb];
        bytes.extend(features(2).marshal().unwrap());
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_message(&mut cursor).unwrap(), None);
        assert_eq!(read_message(&mut cursor).unwrap(), Some(features(2)));
        assert!(read_message(&mut cursor).is_err());
    }

    #[test]
    fn closed_handle_reports_connection_closed() {
        let (send, recv) = channel();
        drop(recv);
        let handle = SwitchHandle::new("switch".to_string(), send);
        let err = handle.send_msg(hello(Version::V1_3)).unwrap_err();
        match *err.kind() {
            ErrorKind::ConnectionClosed(ref peer) => assert_eq!(peer, "switch"),
            ref other => panic!("unexpected {:?}", other),
        }
    }
}
