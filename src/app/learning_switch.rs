use std::convert::TryFrom;
use std::sync::{Arc, PoisonError};

use super::super::ctl::{App, Datapath, Event};
use super::super::ds::actions::ActionHeader;
use super::super::ds::ethernet::EthernetFrame;
use super::super::ds::features::SwitchFeatures;
use super::super::ds::flow_instructions::InstructionHeader;
use super::super::ds::flow_match::{Match, MatchPayload};
use super::super::ds::flow_mod::FlowMod;
use super::super::ds::packet_in::PacketIn;
use super::super::ds::packet_out::PacketOut;
use super::super::ds::ports::{PortNo, PortNumber};
use super::super::ds::{OfMsg, OfPayload};
use super::super::err::*;
use super::mac_table::{ForwardingTable, MacTableStore};

/// Priority of the rule sending unmatched packets to the controller.
pub const TABLE_MISS_PRIORITY: u16 = 0;
/// Priority of rules installed for learned destinations.
pub const LEARNED_FLOW_PRIORITY: u16 = 1;

/// Rule sending every packet no other flow matches to the controller.
pub fn table_miss_flow() -> FlowMod {
    FlowMod::add_flow(
        TABLE_MISS_PRIORITY,
        Match::all(),
        vec![InstructionHeader::apply_actions(vec![
            ActionHeader::to_controller(),
        ])],
    )
}

/// What to do with a packet reported by a switch.
#[derive(Debug, PartialEq, Clone)]
pub enum Forwarding {
    /// Destination is known, install a rule for the flow.
    Install(FlowMod),
    /// Destination is unknown, flood the packet.
    Flood(PacketOut),
}

impl Forwarding {
    pub fn into_payload(self) -> OfPayload {
        match self {
            Forwarding::Install(flow_mod) => OfPayload::FlowMod(flow_mod),
            Forwarding::Flood(packet_out) => OfPayload::PacketOut(packet_out),
        }
    }
}

/// Learns where hosts live and forwards on the learned table.
pub fn decide(
    table: &mut ForwardingTable,
    in_port: PortNumber,
    frame: &EthernetFrame,
    packet_in: &PacketIn,
) -> Forwarding {
    if let Some(old_port) = table.learn(frame.dl_src, in_port) {
        if old_port != in_port {
            info!(
                "Host {} moved from port {:?} to {:?}.",
                frame.dl_src, old_port, in_port
            );
        }
    }

    match table.lookup(&frame.dl_dst) {
        Some(out_port) => {
            let mmatch = Match::all()
                .with(MatchPayload::InPort(in_port))
                .with(MatchPayload::EthDst(frame.dl_dst))
                .with(MatchPayload::EthSrc(frame.dl_src));
            Forwarding::Install(FlowMod::add_flow(
                LEARNED_FLOW_PRIORITY,
                mmatch,
                vec![InstructionHeader::apply_actions(vec![
                    ActionHeader::output(out_port),
                ])],
            ))
        }
        None => {
            // buffered packets are released by the switch, otherwise send the frame
            let data = if packet_in.is_buffered() {
                Vec::new()
            } else {
                packet_in.ethernet_frame.clone()
            };
            Forwarding::Flood(PacketOut::new(
                packet_in.buffer_id,
                in_port,
                vec![ActionHeader::output(PortNumber::Reserved(PortNo::Flood))],
                data,
            ))
        }
    }
}

/// MAC learning switch application.
pub struct LearningSwitch {
    tables: Arc<MacTableStore>,
}

impl LearningSwitch {
    pub fn new(tables: Arc<MacTableStore>) -> Self {
        LearningSwitch { tables: tables }
    }

    pub fn tables(&self) -> &Arc<MacTableStore> {
        &self.tables
    }

    /// Installs the table-miss rule on a freshly connected switch.
    pub fn switch_features(
        &self,
        datapath: &dyn Datapath,
        xid: u32,
        features: &SwitchFeatures,
    ) -> Result<()> {
        info!(
            "Installing table-miss flow on switch {:016x}.",
            features.datapath_id
        );
        let msg = OfMsg::generate(xid, OfPayload::FlowMod(table_miss_flow()))?;
        datapath.send_msg(msg)
    }

    pub fn packet_in(
        &self,
        datapath: &dyn Datapath,
        datapath_id: u64,
        xid: u32,
        packet_in: &PacketIn,
    ) -> Result<()> {
        let frame = EthernetFrame::try_from(&packet_in.ethernet_frame[..])?;
        let in_port = packet_in
            .mmatch
            .in_port()
            .ok_or_else::<Error, _>(|| ErrorKind::MissingMatchField("in_port").into())?;

        let table = self.tables.table(datapath_id);
        let forwarding = {
            let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
            decide(&mut table, in_port, &frame, packet_in)
        };
        match forwarding {
            Forwarding::Install(_) => info!(
                "Switch {:016x}: installing flow {} -> {} out of the learned port.",
                datapath_id, frame.dl_src, frame.dl_dst
            ),
            Forwarding::Flood(_) => debug!(
                "Switch {:016x}: {} unknown, flooding ethertype {:#06x} (vlan {:?}, pcp {}) from {:?}.",
                datapath_id, frame.dl_dst, frame.eth_type, frame.dl_vlan, frame.dl_vlan_pcp, in_port
            ),
        }
        datapath.send_msg(OfMsg::generate(xid, forwarding.into_payload())?)
    }
}

impl App for LearningSwitch {
    fn handle_event(&self, datapath: &dyn Datapath, event: Event) -> Result<()> {
        match event {
            Event::SwitchFeatures { xid, features } => {
                self.switch_features(datapath, xid, &features)
            }
            Event::PacketIn {
                datapath_id,
                xid,
                packet_in,
            } => self.packet_in(datapath, datapath_id, xid, &packet_in),
        }
    }

    fn switch_disconnected(&self, datapath_id: u64) {
        // learned entries stay, a reconnecting switch keeps its table
        info!("Switch {:016x} disconnected.", datapath_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::ds::actions::ActionPayload;
    use super::super::super::ds::features::Capabilities;
    use super::super::super::ds::flow_instructions::InstructionPayload;
    use super::super::super::ds::hw_addr::EthernetAddress;
    use super::super::super::ds::packet_in::InReason;
    use super::super::super::ds::ports::{CONTROLLER_MAX_LEN_NO_BUFFER, NO_BUFFER};
    use std::sync::Mutex;
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OfMsg>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<OfPayload> {
            self.sent
                .lock()
                .unwrap()
                .drain(..)
                .map(OfMsg::into_payload)
                .collect()
        }
    }

    impl Datapath for Recorder {
        fn send_msg(&self, msg: OfMsg) -> Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }
    }

    struct Closed;

    impl Datapath for Closed {
        fn send_msg(&self, _msg: OfMsg) -> Result<()> {
            bail!(ErrorKind::ConnectionClosed("closed".to_string()))
        }
    }

    fn mac(byte: u8) -> EthernetAddress {
        EthernetAddress([byte; 6])
    }

    fn frame(src: EthernetAddress, dst: EthernetAddress) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&dst.octets());
        bytes.extend_from_slice(&src.octets());
        bytes.extend_from_slice(&[0x08, 0x00, 0x45, 0x00]);
        bytes
    }

    fn packet_in_event(
        datapath_id: u64,
        in_port: u32,
        src: EthernetAddress,
        dst: EthernetAddress,
    ) -> Event {
        let ethernet_frame = frame(src, dst);
        Event::PacketIn {
            datapath_id: datapath_id,
            xid: 0,
            packet_in: PacketIn {
                buffer_id: NO_BUFFER,
                total_len: ethernet_frame.len() as u16,
                reason: InReason::NoMatch,
                table_id: 0,
                cookie: 0,
                mmatch: Match::all().with(MatchPayload::InPort(PortNumber::NormalPort(in_port))),
                ethernet_frame: ethernet_frame,
            },
        }
    }

    fn features_event(datapath_id: u64) -> Event {
        Event::SwitchFeatures {
            xid: 1,
            features: SwitchFeatures {
                datapath_id: datapath_id,
                n_buffers: 256,
                n_tables: 254,
                auxiliary_id: 0,
                capabilities: Capabilities::empty(),
                reserved: 0,
            },
        }
    }

    fn switch() -> LearningSwitch {
        LearningSwitch::new(Arc::new(MacTableStore::new()))
    }

    fn output_port(instructions: &[InstructionHeader]) -> PortNumber {
        match &instructions[..] {
            [instruction] => match instruction.payload() {
                InstructionPayload::ApplyActions(actions) => match actions[0].payload() {
                    ActionPayload::Output(output) => output.port,
                    other => panic!("unexpected action {:?}", other),
                },
                other => panic!("unexpected instruction {:?}", other),
            },
            other => panic!("unexpected instructions {:?}", other),
        }
    }

    #[test]
    fn table_miss_rule() {
        let flow = table_miss_flow();
        assert_eq!(flow.priority, 0);
        assert!(flow.mmatch.is_empty());
        assert_eq!(
            output_port(&flow.instructions),
            PortNumber::Reserved(PortNo::Controller)
        );
        match flow.instructions[0].payload() {
            InstructionPayload::ApplyActions(actions) => match actions[0].payload() {
                ActionPayload::Output(output) => {
                    assert_eq!(output.max_len, CONTROLLER_MAX_LEN_NO_BUFFER)
                }
                other => panic!("unexpected action {:?}", other),
            },
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[test]
    fn repeated_handshakes_send_identical_rule() {
        let app = switch();
        let datapath = Recorder::default();
        for _ in 0..3 {
            app.handle_event(&datapath, features_event(1)).unwrap();
        }
        let sent = datapath.take();
        assert_eq!(sent.len(), 3);
        for payload in &sent {
            assert_eq!(payload, &OfPayload::FlowMod(table_miss_flow()));
        }
    }

    #[test]
    fn most_recent_port_is_learned() {
        let app = switch();
        let datapath = Recorder::default();
        let sightings = [(1, 0xaa), (2, 0xbb), (3, 0xaa), (4, 0xcc), (5, 0xbb)];
        for &(port, src) in sightings.iter() {
            app.handle_event(&datapath, packet_in_event(1, port, mac(src), mac(0xee)))
                .unwrap();
        }
        let store = app.tables();
        assert_eq!(store.lookup(1, &mac(0xaa)), Some(PortNumber::NormalPort(3)));
        assert_eq!(store.lookup(1, &mac(0xbb)), Some(PortNumber::NormalPort(5)));
        assert_eq!(store.lookup(1, &mac(0xcc)), Some(PortNumber::NormalPort(4)));
    }

    #[test]
    fn unknown_destination_floods() {
        let app = switch();
        let datapath = Recorder::default();
        for port in 1..4 {
            app.handle_event(&datapath, packet_in_event(1, port, mac(port as u8), mac(0xdd)))
                .unwrap();
        }
        let sent = datapath.take();
        assert_eq!(sent.len(), 3);
        for (port, payload) in (1..4u8).zip(sent) {
            match payload {
                OfPayload::PacketOut(packet_out) => {
                    assert_eq!(packet_out.buffer_id, NO_BUFFER);
                    assert_eq!(packet_out.in_port, PortNumber::NormalPort(port as u32));
                    assert_eq!(packet_out.data, frame(mac(port), mac(0xdd)));
                    assert_eq!(
                        packet_out.actions,
                        vec![ActionHeader::output(PortNumber::Reserved(PortNo::Flood))]
                    );
                }
                other => panic!("expected packet out, got {:?}", other),
            }
        }
    }

    #[test]
    fn buffered_flood_leaves_data_out() {
        let mut table = ForwardingTable::new();
        let bytes = frame(mac(1), mac(2));
        let packet_in = PacketIn {
            buffer_id: 77,
            total_len: bytes.len() as u16,
            reason: InReason::NoMatch,
            table_id: 0,
            cookie: 0,
            mmatch: Match::all(),
            ethernet_frame: bytes.clone(),
        };
        let eth = EthernetFrame::try_from(&bytes[..]).unwrap();
        match decide(&mut table, PortNumber::NormalPort(1), &eth, &packet_in) {
            Forwarding::Flood(packet_out) => {
                assert_eq!(packet_out.buffer_id, 77);
                assert_eq!(packet_out.in_port, PortNumber::NormalPort(1));
                assert!(packet_out.data.is_empty());
            }
            other => panic!("expected flood, got {:?}", other),
        }
    }

    #[test]
    fn known_destination_installs_flow() {
        let app = switch();
        let datapath = Recorder::default();
        app.handle_event(&datapath, packet_in_event(1, 7, mac(0xdd), mac(0xee)))
            .unwrap();
        datapath.take();

        app.handle_event(&datapath, packet_in_event(1, 2, mac(0x11), mac(0xdd)))
            .unwrap();
        let sent = datapath.take();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            OfPayload::FlowMod(flow_mod) => {
                assert_eq!(flow_mod.priority, 1);
                assert_eq!(flow_mod.mmatch.in_port(), Some(PortNumber::NormalPort(2)));
                assert_eq!(flow_mod.mmatch.eth_dst(), Some(mac(0xdd)));
                assert_eq!(flow_mod.mmatch.eth_src(), Some(mac(0x11)));
                assert_eq!(output_port(&flow_mod.instructions), PortNumber::NormalPort(7));
            }
            other => panic!("expected flow mod, got {:?}", other),
        }
    }

    #[test]
    fn concurrent_packet_ins_on_one_switch() {
        let app = Arc::new(switch());
        let handles: Vec<_> = (1..=8u32)
            .map(|port| {
                let app = Arc::clone(&app);
                thread::spawn(move || {
                    let datapath = Recorder::default();
                    for round in 0..50u32 {
                        let dst = mac((round % 8 + 1) as u8);
                        app.handle_event(&datapath, packet_in_event(1, port, mac(port as u8), dst))
                            .unwrap();
                    }
                    datapath.take().len()
                })
            })
            .collect();
        for handle in handles {
            // one flood or flow mod per packet in
            assert_eq!(handle.join().unwrap(), 50);
        }

        assert_eq!(app.tables().switch_count(), 1);
        let table = app.tables().get(1).unwrap();
        let table = table.lock().unwrap();
        assert_eq!(table.len(), 8);
        for port in 1..=8u32 {
            assert_eq!(
                table.lookup(&mac(port as u8)),
                Some(PortNumber::NormalPort(port))
            );
        }
    }

    #[test]
    fn switches_learn_independently() {
        let app = switch();
        let datapath = Recorder::default();
        app.handle_event(&datapath, packet_in_event(1, 1, mac(0xaa), mac(0xbb)))
            .unwrap();
        app.handle_event(&datapath, packet_in_event(2, 1, mac(0xcc), mac(0xaa)))
            .unwrap();
        match &datapath.take()[..] {
            [OfPayload::PacketOut(_), OfPayload::PacketOut(_)] => (),
            other => panic!("expected two floods, got {:?}", other),
        }
        assert_eq!(app.tables().lookup(2, &mac(0xaa)), None);
        assert_eq!(app.tables().lookup(1, &mac(0xcc)), None);
    }

    #[test]
    fn short_frame_is_dropped() {
        let app = switch();
        let datapath = Recorder::default();
        let mut event = packet_in_event(1, 1, mac(0xaa), mac(0xbb));
        if let Event::PacketIn { ref mut packet_in, .. } = event {
            packet_in.ethernet_frame.truncate(10);
        }
        let err = app.handle_event(&datapath, event).unwrap_err();
        match *err.kind() {
            ErrorKind::TruncatedFrame(10) => (),
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(datapath.take().is_empty());
        assert!(app.tables().get(1).is_none());
    }

    #[test]
    fn packet_in_without_in_port_is_dropped() {
        let app = switch();
        let datapath = Recorder::default();
        let mut event = packet_in_event(1, 1, mac(0xaa), mac(0xbb));
        if let Event::PacketIn { ref mut packet_in, .. } = event {
            packet_in.mmatch = Match::all();
        }
        let err = app.handle_event(&datapath, event).unwrap_err();
        match *err.kind() {
            ErrorKind::MissingMatchField("in_port") => (),
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(datapath.take().is_empty());
    }

    #[test]
    fn send_failure_is_reported() {
        let app = switch();
        let err = app.handle_event(&Closed, features_event(1)).unwrap_err();
        match *err.kind() {
            ErrorKind::ConnectionClosed(_) => (),
            ref other => panic!("unexpected {:?}", other),
        }
    }
}
