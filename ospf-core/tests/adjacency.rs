//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use const_addrs::ip4;
use maplit::btreemap;
use ospf_core::collections::{
    AreaIndex, AreaKey, InterfaceIndex, InterfaceKey, NeighborKey,
};
use ospf_core::instance::{Instance, ProtocolInputChannelsRx};
use ospf_core::interface::{InterfaceCfg, InterfaceType, StaticNeighbor, ism};
use ospf_core::neighbor::{Neighbor, RxmtPacketType, nsm};
use ospf_core::packet::lsa::{LsaHdr, LsaType};
use ospf_core::packet::{
    DbDescFlags, DbDescPacket, HelloPacket, LsUpdatePacket, Packet, PacketHdr,
    PacketType,
};
use ospf_core::tasks::messages::input::{
    DelayedAckMsg, IsmEventMsg, NetRxPacketMsg, NsmEventMsg, RxmtIntervalMsg,
};
use ospf_core::tasks::messages::output::NetTxPacketMsg;
use ospf_core::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use tokio::sync::mpsc::UnboundedReceiver;

const RTR_ID: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);
const NBR_RTR_ID: Ipv4Addr = Ipv4Addr::new(2, 2, 2, 2);
const BACKBONE: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
const IFINDEX: u32 = 1;

struct TestRouter {
    instance: Instance,
    input_rx: ProtocolInputChannelsRx,
    output_rx: UnboundedReceiver<ProtocolOutputMsg>,
    area_idx: AreaIndex,
    iface_idx: InterfaceIndex,
}

impl TestRouter {
    fn new(if_type: InterfaceType) -> TestRouter {
        Self::with_config(InterfaceCfg {
            ifindex: IFINDEX,
            if_type,
            addr: Some("10.0.1.1/24".parse().unwrap()),
            ..Default::default()
        })
    }

    fn with_config(config: InterfaceCfg) -> TestRouter {
        let (mut instance, input_rx, output_rx) =
            Instance::new("test".to_owned());
        instance.config.router_id = Some(RTR_ID);

        let area_idx = instance.add_area(BACKBONE);
        let iface_idx = instance.add_interface(area_idx, "eth0", config);
        instance.update();

        let mut router = TestRouter {
            instance,
            input_rx,
            output_rx,
            area_idx,
            iface_idx,
        };
        router.pump();
        router.drain_output();
        router
    }

    // Process internally queued events until quiescence.
    fn pump(&mut self) {
        while let Some(msg) = self.input_rx.try_recv() {
            self.instance.process_protocol_msg(msg);
        }
    }

    fn recv_packet(&mut self, src: Ipv4Addr, dst: Ipv4Addr, packet: Packet) {
        let msg = NetRxPacketMsg {
            ifindex: IFINDEX,
            src,
            dst,
            packet,
        };
        self.instance
            .process_protocol_msg(ProtocolInputMsg::NetRxPacket(msg));
        self.pump();
    }

    fn nsm_event(&mut self, router_id: Ipv4Addr, event: nsm::Event) {
        let msg = NsmEventMsg {
            area_key: AreaKey::Value(BACKBONE),
            iface_key: InterfaceKey::Value("eth0".to_owned()),
            nbr_key: NeighborKey::Value(router_id),
            event,
        };
        self.instance
            .process_protocol_msg(ProtocolInputMsg::NsmEvent(msg));
        self.pump();
    }

    fn rxmt_interval(&mut self, router_id: Ipv4Addr, packet_type: RxmtPacketType) {
        let msg = RxmtIntervalMsg {
            area_key: AreaKey::Value(BACKBONE),
            iface_key: InterfaceKey::Value("eth0".to_owned()),
            nbr_key: NeighborKey::Value(router_id),
            packet_type,
        };
        self.instance
            .process_protocol_msg(ProtocolInputMsg::RxmtInterval(msg));
        self.pump();
    }

    fn drain_output(&mut self) -> Vec<NetTxPacketMsg> {
        let mut msgs = vec![];
        while let Ok(msg) = self.output_rx.try_recv() {
            let ProtocolOutputMsg::NetTxPacket(msg) = msg;
            msgs.push(msg);
        }
        msgs
    }

    fn nbr(&self, router_id: Ipv4Addr) -> &Neighbor {
        let iface = &self.instance.arenas.interfaces[self.iface_idx];
        let (_, nbr) = iface
            .state
            .neighbors
            .get_by_router_id(&self.instance.arenas.neighbors, router_id)
            .expect("neighbor not found");
        nbr
    }

    fn has_nbr(&self, router_id: Ipv4Addr) -> bool {
        let iface = &self.instance.arenas.interfaces[self.iface_idx];
        iface
            .state
            .neighbors
            .get_by_router_id(&self.instance.arenas.neighbors, router_id)
            .is_some()
    }

    fn nbr_state(&self, router_id: Ipv4Addr) -> nsm::State {
        self.nbr(router_id).state
    }

    fn ism_state(&self) -> ism::State {
        self.instance.arenas.interfaces[self.iface_idx].state.ism_state
    }
}

// ===== packet builders =====

fn hello(router_id: Ipv4Addr, neighbors: Vec<Ipv4Addr>) -> Packet {
    Packet::Hello(HelloPacket {
        hdr: PacketHdr::new(PacketType::Hello, router_id, BACKBONE),
        network_mask: ip4!("255.255.255.0"),
        hello_interval: 10,
        dead_interval: 40,
        priority: 1,
        dr: None,
        bdr: None,
        neighbors,
    })
}

fn dbdesc(
    router_id: Ipv4Addr,
    dd_flags: DbDescFlags,
    dd_seq_no: u32,
    lsa_hdrs: Vec<LsaHdr>,
) -> Packet {
    Packet::DbDesc(DbDescPacket {
        hdr: PacketHdr::new(PacketType::DbDesc, router_id, BACKBONE),
        mtu: 1500,
        dd_flags,
        dd_seq_no,
        lsa_hdrs,
    })
}

fn lsa_hdr(lsa_id: Ipv4Addr, seq_no: u32) -> LsaHdr {
    LsaHdr {
        age: 1,
        lsa_type: LsaType::Router,
        lsa_id,
        adv_rtr: lsa_id,
        seq_no,
    }
}

// Brings the neighbor up to the ExStart state on a point-to-point
// interface. As 2.2.2.2 > 1.1.1.1, the neighbor wins the master/slave
// negotiation once its initial Database Description packet arrives.
fn two_way(router: &mut TestRouter) {
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(NBR_RTR_ID, vec![RTR_ID]),
    );
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
}

// Completes the master/slave negotiation with this router as slave. The
// master advertises the given LSA headers in its first real packet.
fn negotiate(router: &mut TestRouter, lsa_hdrs: Vec<LsaHdr>) {
    two_way(router);
    router.drain_output();

    // Master's initial Database Description packet.
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        dbdesc(
            NBR_RTR_ID,
            DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
            1000,
            vec![],
        ),
    );
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Exchange);
    router.drain_output();

    // Master's first (and only) real packet: the MS bit stays set, the M
    // bit is clear as there is nothing more to describe.
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        dbdesc(NBR_RTR_ID, DbDescFlags::MS, 1001, lsa_hdrs),
    );
}

// ===== tests =====

// Self-originated packets must be discarded before any processing.
#[test]
fn packet_self_discard() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(RTR_ID, vec![]),
    );

    assert!(!router.has_nbr(RTR_ID));
    assert!(router.drain_output().is_empty());
}

// Packets with an unsupported OSPF version must be dropped.
#[test]
fn packet_version_gate() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);

    let mut packet = hello(NBR_RTR_ID, vec![]);
    if let Packet::Hello(hello) = &mut packet {
        hello.hdr.version = 3;
    }
    router.recv_packet(ip4!("10.0.1.2"), ip4!("224.0.0.5"), packet);

    assert!(!router.has_nbr(NBR_RTR_ID));
    assert!(router.drain_output().is_empty());
}

// Packets whose Area ID doesn't match any configured area must be dropped.
#[test]
fn packet_area_mismatch() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);

    let mut packet = hello(NBR_RTR_ID, vec![]);
    if let Packet::Hello(hello) = &mut packet {
        hello.hdr.area_id = ip4!("0.0.0.1");
    }
    router.recv_packet(ip4!("10.0.1.2"), ip4!("224.0.0.5"), packet);

    assert!(!router.has_nbr(NBR_RTR_ID));
}

// Non-Hello packets require a preexisting neighbor.
#[test]
fn packet_requires_neighbor() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        dbdesc(
            NBR_RTR_ID,
            DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
            1000,
            vec![],
        ),
    );

    assert!(!router.has_nbr(NBR_RTR_ID));
    assert!(router.drain_output().is_empty());
}

// Packets sent to AllDRouters are accepted only on DR/Backup interfaces.
#[test]
fn packet_alldrouters_state_check() {
    let mut router = TestRouter::with_config(InterfaceCfg {
        ifindex: IFINDEX,
        if_type: InterfaceType::Broadcast,
        addr: Some("10.0.1.1/24".parse().unwrap()),
        // Priority 0 makes this router ineligible (DrOther).
        priority: 0,
        ..Default::default()
    });
    assert_eq!(router.ism_state(), ism::State::DrOther);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.6"),
        hello(NBR_RTR_ID, vec![]),
    );

    assert!(!router.has_nbr(NBR_RTR_ID));
}

// Packets failing authentication must be dropped.
#[test]
fn packet_auth_failure() {
    use ospf_core::packet::auth::AuthCfg;

    let mut router = TestRouter::with_config(InterfaceCfg {
        ifindex: IFINDEX,
        if_type: InterfaceType::Broadcast,
        addr: Some("10.0.1.1/24".parse().unwrap()),
        auth: AuthCfg::Simple(*b"s3cr3t!!"),
        ..Default::default()
    });

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(NBR_RTR_ID, vec![]),
    );

    assert!(!router.has_nbr(NBR_RTR_ID));
}

// Down + Start: poll timer cleared, one Hello sent with TTL 1, inactivity
// timer started, new state Attempt.
#[test]
fn nsm_down_start() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);

    // Create the neighbor and drive it back to Down.
    two_way(&mut router);
    router.nsm_event(NBR_RTR_ID, nsm::Event::InactivityTimer);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Down);
    router.drain_output();

    router.nsm_event(NBR_RTR_ID, nsm::Event::Start);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Attempt);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(nbr.tasks.poll_interval.is_none());
    assert!(nbr.tasks.inactivity_timer.is_some());
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::Hello);
    assert_eq!(msgs[0].dst.ttl, 1);
}

// A Hello from a neighbor that doesn't list us yet leaves it in Init.
#[test]
fn nsm_hello_one_way() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(NBR_RTR_ID, vec![]),
    );

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Init);
}

// Repeated HelloReceived events are idempotent self-loops: the state is
// unchanged and the inactivity timer stays armed.
#[test]
fn nsm_hello_self_loop() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    two_way(&mut router);

    for _ in 0..3 {
        router.recv_packet(
            ip4!("10.0.1.2"),
            ip4!("224.0.0.5"),
            hello(NBR_RTR_ID, vec![RTR_ID]),
        );
        assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
        assert!(router.nbr(NBR_RTR_ID).tasks.inactivity_timer.is_some());
    }
}

// Events not recognized by a state are no-ops: no state change, no timers
// armed, nothing sent.
#[test]
fn nsm_unexpected_events() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(NBR_RTR_ID, vec![]),
    );
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Init);
    router.drain_output();

    for event in [
        nsm::Event::NegotiationDone,
        nsm::Event::ExchangeDone,
        nsm::Event::LoadingDone,
        nsm::Event::BadLsReq,
        nsm::Event::AdjOk,
        nsm::Event::RxmtTimer(RxmtPacketType::DbDesc),
        nsm::Event::PollTimer,
    ] {
        router.nsm_event(NBR_RTR_ID, event);
        assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Init);
        assert!(router.drain_output().is_empty());
    }
}

// Transitions to Down clear the pending adjacency state, so that the next
// negotiation starts from scratch.
#[test]
fn nsm_inactivity_resets_adjacency() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    two_way(&mut router);

    router.nsm_event(NBR_RTR_ID, nsm::Event::InactivityTimer);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Down);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(nbr.tasks.inactivity_timer.is_none());
    assert!(nbr.tasks.rxmt_dbdesc.is_none());
    assert!(nbr.lists.ls_request.is_empty());
    assert!(nbr.lists.db_summary.is_empty());
    assert!(nbr.last_sent_dbdesc.is_none());
}

// KillNbr deletes the neighbor altogether.
#[test]
fn nsm_kill_deletes_neighbor() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    two_way(&mut router);

    router.nsm_event(NBR_RTR_ID, nsm::Event::Kill);

    assert!(!router.has_nbr(NBR_RTR_ID));
}

// SeqNoMismatch from Exchange restarts the negotiation with a strictly
// greater DD sequence number.
#[test]
fn nsm_seqno_mismatch_recovers() {
    use ospf_core::debug::SeqNoMismatchReason;

    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    negotiate(&mut router, vec![lsa_hdr(ip4!("3.3.3.3"), 0x80000001)]);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);

    let seq_no_before = router.nbr(NBR_RTR_ID).dd_seq_no;
    router.nsm_event(
        NBR_RTR_ID,
        nsm::Event::SeqNoMismatch(SeqNoMismatchReason::UnexpectedDbDesc),
    );

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
    assert!(router.nbr(NBR_RTR_ID).dd_seq_no > seq_no_before);
    assert!(router.nbr(NBR_RTR_ID).tasks.rxmt_dbdesc.is_some());
}

// ExchangeStart + NegotiationDone: exactly one Database Description packet
// is sent and the retransmission timer is cleared.
#[test]
fn nsm_negotiation_done() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    two_way(&mut router);
    router.drain_output();

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        dbdesc(
            NBR_RTR_ID,
            DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
            1000,
            vec![],
        ),
    );

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Exchange);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(!nbr.dd_flags.contains(DbDescFlags::MS));
    assert_eq!(nbr.dd_seq_no, 1000);
    assert!(nbr.tasks.rxmt_dbdesc.is_none());
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::DbDesc);
}

// ExchangeDone with an empty request list goes straight to Full.
#[test]
fn nsm_exchange_to_full_shortcut() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    negotiate(&mut router, vec![]);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Full);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(nbr.tasks.rxmt_lsreq.is_none());
    // The saved packet is kept for RouterDeadInterval seconds.
    assert!(nbr.tasks.rxmt_dbdesc.is_some());
    assert!(nbr.last_sent_dbdesc.is_some());
}

// ExchangeDone with outstanding requests goes through Loading, and the
// received LS Update completes the adjacency.
#[test]
fn nsm_loading_to_full() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    let missing = lsa_hdr(ip4!("3.3.3.3"), 0x80000001);
    negotiate(&mut router, vec![missing]);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);
    let msgs = router.drain_output();
    assert!(
        msgs.iter()
            .any(|msg| msg.packet.pkt_type() == PacketType::LsRequest)
    );
    assert!(router.nbr(NBR_RTR_ID).tasks.rxmt_lsreq.is_some());

    // The requested LSA arrives.
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        Packet::LsUpdate(LsUpdatePacket {
            hdr: PacketHdr::new(PacketType::LsUpdate, NBR_RTR_ID, BACKBONE),
            lsas: vec![missing],
        }),
    );

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Full);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(nbr.tasks.rxmt_lsreq.is_none());
    assert!(nbr.lists.ls_request_pending.is_empty());

    // The LSA was installed and gets acknowledged on the next delayed-ack
    // tick.
    let area = &router.instance.arenas.areas[router.area_idx];
    assert_eq!(area.state.lsdb.len(), 1);
    router.instance.process_protocol_msg(ProtocolInputMsg::DelayedAck(
        DelayedAckMsg {
            area_key: AreaKey::Value(BACKBONE),
            iface_key: InterfaceKey::Value("eth0".to_owned()),
        },
    ));
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::LsAck);
}

// Loading + DDRetransmissionTimer: the saved Database Description packet
// is discarded, nothing is sent, and the state is unchanged.
#[test]
fn nsm_loading_dbdesc_free() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    negotiate(&mut router, vec![lsa_hdr(ip4!("3.3.3.3"), 0x80000001)]);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);
    router.drain_output();

    router.rxmt_interval(NBR_RTR_ID, RxmtPacketType::DbDesc);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);
    let nbr = router.nbr(NBR_RTR_ID);
    assert!(nbr.last_sent_dbdesc.is_none());
    assert!(nbr.tasks.rxmt_dbdesc.is_none());
    assert!(router.drain_output().is_empty());
}

// The DD retransmission tick in ExStart resends the last packet.
#[test]
fn nsm_exstart_dbdesc_rxmt() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    two_way(&mut router);
    router.drain_output();

    router.rxmt_interval(NBR_RTR_ID, RxmtPacketType::DbDesc);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::DbDesc);
}

// A received LS Request for an LSA we don't have resets the adjacency.
#[test]
fn nsm_bad_ls_request() {
    use ospf_core::packet::LsRequestPacket;

    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    negotiate(&mut router, vec![]);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Full);

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        Packet::LsRequest(LsRequestPacket {
            hdr: PacketHdr::new(PacketType::LsRequest, NBR_RTR_ID, BACKBONE),
            entries: vec![lsa_hdr(ip4!("9.9.9.9"), 0x80000001).key()],
        }),
    );

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
}

// NBMA: a dead static neighbor is polled at the reduced PollInterval rate.
#[test]
fn nsm_nbma_poll() {
    let mut router = TestRouter::with_config(InterfaceCfg {
        ifindex: IFINDEX,
        if_type: InterfaceType::NonBroadcast,
        addr: Some("10.0.1.1/24".parse().unwrap()),
        static_nbrs: btreemap! {
            ip4!("10.0.1.2") => StaticNeighbor {
                priority: 1,
                poll_interval: 120,
            },
        },
        ..Default::default()
    });

    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("10.0.1.1"),
        hello(NBR_RTR_ID, vec![]),
    );
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Init);
    router.drain_output();

    // The neighbor times out; polling starts.
    router.nsm_event(NBR_RTR_ID, nsm::Event::InactivityTimer);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Down);
    assert!(router.nbr(NBR_RTR_ID).tasks.poll_interval.is_some());

    // A poll tick sends one Hello and leaves the state unchanged.
    router.nsm_event(NBR_RTR_ID, nsm::Event::PollTimer);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Down);
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::Hello);

    // A received Hello stops the polling.
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("10.0.1.1"),
        hello(NBR_RTR_ID, vec![]),
    );
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Init);
    assert!(router.nbr(NBR_RTR_ID).tasks.poll_interval.is_none());
}

// The Hello timer sends one Hello listing all known neighbors.
#[test]
fn ism_hello_timer() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);
    router.recv_packet(
        ip4!("10.0.1.2"),
        ip4!("224.0.0.5"),
        hello(NBR_RTR_ID, vec![]),
    );
    router.drain_output();

    router.instance.process_protocol_msg(ProtocolInputMsg::IsmEvent(
        IsmEventMsg {
            area_key: AreaKey::Value(BACKBONE),
            iface_key: InterfaceKey::Value("eth0".to_owned()),
            event: ism::Event::HelloTimer,
        },
    ));

    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    match &msgs[0].packet {
        Packet::Hello(hello) => {
            assert_eq!(hello.hdr.router_id, RTR_ID);
            assert_eq!(hello.neighbors, vec![NBR_RTR_ID]);
        }
        _ => panic!("expected an Hello packet"),
    }
    assert_eq!(msgs[0].dst.addrs.as_slice(), &[ip4!("224.0.0.5")]);
}

// The LS Request retransmission tick resends the pending requests without
// disturbing the state.
#[test]
fn nsm_loading_lsreq_rxmt() {
    let mut router = TestRouter::new(InterfaceType::PointToPoint);
    negotiate(&mut router, vec![lsa_hdr(ip4!("3.3.3.3"), 0x80000001)]);
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);
    router.drain_output();

    router.rxmt_interval(NBR_RTR_ID, RxmtPacketType::LsRequest);

    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::Loading);
    let msgs = router.drain_output();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].packet.pkt_type(), PacketType::LsRequest);
}

// Broadcast: a single neighbor declaring itself DR is elected once the
// BackupSeen event fires.
#[test]
fn ism_dr_election() {
    let mut router = TestRouter::new(InterfaceType::Broadcast);
    assert_eq!(router.ism_state(), ism::State::Waiting);

    let mut packet = hello(NBR_RTR_ID, vec![RTR_ID]);
    if let Packet::Hello(hello) = &mut packet {
        hello.dr = Some(ip4!("10.0.1.2"));
    }
    router.recv_packet(ip4!("10.0.1.2"), ip4!("224.0.0.5"), packet);

    // BackupSeen triggered the election: the neighbor keeps DR and this
    // router becomes Backup.
    let iface = &router.instance.arenas.interfaces[router.iface_idx];
    assert_eq!(iface.state.dr, Some(ip4!("10.0.1.2")));
    assert_eq!(iface.state.bdr, Some(ip4!("10.0.1.1")));
    assert_eq!(router.ism_state(), ism::State::Backup);

    // Being Backup on the segment, an adjacency is formed.
    assert_eq!(router.nbr_state(NBR_RTR_ID), nsm::State::ExStart);
}

// Hello packets received over the transit area are demultiplexed to the
// backbone virtual link.
#[test]
fn vlink_packet_acceptance() {
    let (mut instance, input_rx, output_rx) = Instance::new("test".to_owned());
    instance.config.router_id = Some(RTR_ID);

    // Backbone with a virtual link through the transit area.
    let backbone_idx = instance.add_area(BACKBONE);
    let vlink_idx = instance.add_interface(
        backbone_idx,
        "vlink0",
        InterfaceCfg {
            ifindex: 100,
            if_type: InterfaceType::Virtual,
            addr: Some("10.0.2.1/32".parse().unwrap()),
            transit_area_id: Some(ip4!("0.0.0.1")),
            vlink_peer: Some(ip4!("3.3.3.3")),
            vlink_peer_addr: Some(ip4!("10.0.2.2")),
            ..Default::default()
        },
    );
    let transit_idx = instance.add_area(ip4!("0.0.0.1"));
    instance.add_interface(
        transit_idx,
        "eth1",
        InterfaceCfg {
            ifindex: 2,
            if_type: InterfaceType::Broadcast,
            addr: Some("10.0.2.1/24".parse().unwrap()),
            ..Default::default()
        },
    );
    instance.update();

    let mut router = TestRouter {
        instance,
        input_rx,
        output_rx,
        area_idx: backbone_idx,
        iface_idx: vlink_idx,
    };
    router.pump();
    router.drain_output();

    // Backbone Hello arriving on the transit-area interface.
    let msg = NetRxPacketMsg {
        ifindex: 2,
        src: ip4!("10.0.2.2"),
        dst: ip4!("10.0.2.1"),
        packet: hello(ip4!("3.3.3.3"), vec![RTR_ID]),
    };
    router
        .instance
        .process_protocol_msg(ProtocolInputMsg::NetRxPacket(msg));
    router.pump();

    // The neighbor was created on the virtual interface and the adjacency
    // negotiation started with the virtual-link TTL.
    assert_eq!(router.nbr_state(ip4!("3.3.3.3")), nsm::State::ExStart);
    let msgs = router.drain_output();
    assert!(
        msgs.iter().any(|msg| {
            msg.packet.pkt_type() == PacketType::DbDesc && msg.dst.ttl == 32
        })
    );
}
