//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use smallvec::smallvec;

use crate::area::Area;
use crate::collections::Arena;
use crate::instance::InstanceUpView;
use crate::interface::{Interface, InterfaceType, ism};
use crate::neighbor::{Neighbor, nsm};
use crate::network::{MulticastAddr, SendDestination};
use crate::packet::auth::{AuthCfg, PacketAuth};
use crate::packet::lsa::LsaHdr;
use crate::packet::{
    DbDescFlags, DbDescPacket, HelloPacket, LsAckPacket, LsRequestPacket,
    LsUpdatePacket, OSPF_VERSION, Packet, PacketHdr, PacketType,
};
use crate::tasks::messages::output::NetTxPacketMsg;

// Maximum size of the IP header prepended by the transport.
const IPV4_HDR_LENGTH: u16 = 20;

// ===== Hello Packets =====

pub(crate) fn send_hello(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    dst: SendDestination,
) {
    // Generate Hello packet.
    let hdr = packet_hdr(PacketType::Hello, iface, area, instance);
    let packet = Packet::Hello(HelloPacket {
        hdr,
        network_mask: iface
            .config
            .addr
            .map(|addr| addr.mask())
            .unwrap_or(Ipv4Addr::UNSPECIFIED),
        hello_interval: iface.config.hello_interval,
        dead_interval: iface.config.dead_interval.into(),
        priority: iface.config.priority,
        dr: iface.state.dr,
        bdr: iface.state.bdr,
        neighbors: iface.state.neighbors.router_ids().collect(),
    });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);
}

// Sends an Hello packet directly to the given neighbor (NBMA Start and
// poll events).
pub(crate) fn send_hello_direct(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let dst = SendDestination::new(
        iface.config.ifindex,
        smallvec![nbr.src],
        iface.send_ttl(),
    );
    send_hello(iface, area, instance, dst);
}

// ===== Database Description Packets =====

pub(crate) fn send_dbdesc(
    nbr: &mut Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Calculate maximum packet size.
    let max_size = max_packet_size(iface)
        - PacketHdr::LENGTH
        - DbDescPacket::BASE_LENGTH;

    // Append as many LSA headers as possible while on the Exchange state.
    let mut total = 0;
    let mut lsa_hdrs = vec![];
    if !nbr.dd_flags.contains(DbDescFlags::I) {
        while total + LsaHdr::LENGTH <= max_size {
            match nbr.lists.db_summary.pop_first() {
                Some((_, lsa_hdr)) => {
                    total += LsaHdr::LENGTH;
                    lsa_hdrs.push(lsa_hdr);
                }
                None => break,
            }
        }
    }

    // Clear the M-bit if there's no more data to send.
    if !nbr.dd_flags.contains(DbDescFlags::I)
        && nbr.lists.db_summary.is_empty()
    {
        nbr.dd_flags.remove(DbDescFlags::M);
    }

    // Generate Database Description packet.
    let hdr = packet_hdr(PacketType::DbDesc, iface, area, instance);
    let packet = Packet::DbDesc(DbDescPacket {
        hdr,
        mtu: iface.config.mtu,
        dd_flags: nbr.dd_flags,
        dd_seq_no: nbr.dd_seq_no,
        lsa_hdrs,
    });

    // Enqueue packet for network transmission, keeping a copy for
    // retransmission and duplicate answering.
    let msg = NetTxPacketMsg { packet, dst };
    nbr.last_sent_dbdesc = Some(msg.clone());
    iface.send_packet(instance, msg);
}

// Retransmits the last sent Database Description packet, if it's still
// around.
pub(crate) fn rxmt_dbdesc(
    nbr: &Neighbor,
    iface: &Interface,
    instance: &InstanceUpView<'_>,
) -> bool {
    match &nbr.last_sent_dbdesc {
        Some(msg) => {
            iface.send_packet(instance, msg.clone());
            true
        }
        None => false,
    }
}

// ===== LS Request Packets =====

pub(crate) fn send_lsreq(
    nbr: &mut Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Calculate maximum packet size.
    let max_size = max_packet_size(iface) - PacketHdr::LENGTH;

    // Append as many LS Request entries as possible in a single packet.
    let mut total = 0;
    while total + LsRequestPacket::ENTRY_LENGTH <= max_size {
        match nbr.lists.ls_request.pop_first() {
            Some((lsa_key, lsa_hdr)) => {
                nbr.lists.ls_request_pending.insert(lsa_key, lsa_hdr);
                total += LsRequestPacket::ENTRY_LENGTH;
            }
            None => break,
        }
    }

    // Generate Link State Request packet.
    let hdr = packet_hdr(PacketType::LsRequest, iface, area, instance);
    let entries = nbr.lists.ls_request_pending.keys().copied().collect();
    let packet = Packet::LsRequest(LsRequestPacket { hdr, entries });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);

    // Start retransmission interval.
    nbr.rxmt_lsreq_start(iface, area, instance);
}

pub(crate) fn rxmt_lsreq(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Generate Link State Request packet.
    let hdr = packet_hdr(PacketType::LsRequest, iface, area, instance);
    let entries = nbr.lists.ls_request_pending.keys().copied().collect();
    let packet = Packet::LsRequest(LsRequestPacket { hdr, entries });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);
}

// ===== LS Update Packets =====

// Sends the requested LSAs directly to the neighbor, in response to a
// received Link State Request packet.
pub(crate) fn send_lsupd_direct(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    lsas: Vec<LsaHdr>,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Generate Link State Update packet.
    let hdr = packet_hdr(PacketType::LsUpdate, iface, area, instance);
    let packet = Packet::LsUpdate(LsUpdatePacket { hdr, lsas });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);
}

pub(crate) fn rxmt_lsupd(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Generate Link State Update packet.
    let hdr = packet_hdr(PacketType::LsUpdate, iface, area, instance);
    let lsas = nbr.lists.ls_rxmt.values().copied().collect();
    let packet = Packet::LsUpdate(LsUpdatePacket { hdr, lsas });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);
}

// ===== LS Ack Packets =====

pub(crate) fn send_lsack_direct(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    lsa_hdr: &LsaHdr,
) {
    let dst = send_dest_nbr(nbr, iface);

    // Generate Link State Ack packet.
    let hdr = packet_hdr(PacketType::LsAck, iface, area, instance);
    let packet = Packet::LsAck(LsAckPacket {
        hdr,
        lsa_hdrs: vec![*lsa_hdr],
    });

    // Enqueue packet for network transmission.
    let msg = NetTxPacketMsg { packet, dst };
    iface.send_packet(instance, msg);
}

pub(crate) fn send_lsack_delayed(
    iface: &mut Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    neighbors: &Arena<Neighbor>,
) {
    let dst = send_dest_iface(iface, neighbors);

    // Calculate maximum packet size.
    let max_size = max_packet_size(iface) - PacketHdr::LENGTH;

    // Send as many LS Acks as necessary.
    while !iface.state.ls_ack_list.is_empty() {
        // Append as many LSA headers as possible in a single packet.
        let mut total = 0;
        let mut lsa_hdrs = vec![];
        while total + LsaHdr::LENGTH <= max_size {
            match iface.state.ls_ack_list.pop_first() {
                Some((_, lsa_hdr)) => {
                    total += LsaHdr::LENGTH;
                    lsa_hdrs.push(lsa_hdr);
                }
                None => break,
            }
        }

        // Generate Link State Ack packet.
        let hdr = packet_hdr(PacketType::LsAck, iface, area, instance);
        let packet = Packet::LsAck(LsAckPacket { hdr, lsa_hdrs });

        // Enqueue packet for network transmission.
        let msg = NetTxPacketMsg {
            packet,
            dst: dst.clone(),
        };
        iface.send_packet(instance, msg);
    }
}

// ===== helper functions =====

fn packet_hdr(
    pkt_type: PacketType,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> PacketHdr {
    PacketHdr {
        version: OSPF_VERSION,
        pkt_type,
        router_id: instance.state.router_id,
        area_id: area.area_id,
        auth: match iface.config.auth {
            AuthCfg::Null => PacketAuth::Null,
            AuthCfg::Simple(key) => PacketAuth::Simple(key),
        },
    }
}

// Returns the maximum OSPF packet size that can be sent on this interface.
fn max_packet_size(iface: &Interface) -> u16 {
    iface.config.mtu - IPV4_HDR_LENGTH
}

// Returns destination used to send a packet directly to the given neighbor.
fn send_dest_nbr(nbr: &Neighbor, iface: &Interface) -> SendDestination {
    let addr = if iface.config.if_type == InterfaceType::PointToPoint {
        MulticastAddr::AllSpfRtrs.addr()
    } else {
        nbr.src
    };
    SendDestination::new(iface.config.ifindex, smallvec![addr], iface.send_ttl())
}

// Returns a destination used to send a packet to all adjacent neighbors
// associated with the given interface.
fn send_dest_iface(
    iface: &Interface,
    neighbors: &Arena<Neighbor>,
) -> SendDestination {
    let addrs = match iface.config.if_type {
        InterfaceType::Broadcast => {
            let addr = if matches!(
                iface.state.ism_state,
                ism::State::Dr | ism::State::Backup
            ) {
                MulticastAddr::AllSpfRtrs
            } else {
                MulticastAddr::AllDrRtrs
            };
            smallvec![addr.addr()]
        }
        InterfaceType::PointToPoint => {
            smallvec![MulticastAddr::AllSpfRtrs.addr()]
        }
        InterfaceType::NonBroadcast
        | InterfaceType::PointToMultipoint
        | InterfaceType::Virtual => {
            // On non-broadcast networks, separate delayed LS Ack packets
            // must be sent, as unicasts, to each adjacent neighbor.
            iface
                .state
                .neighbors
                .iter(neighbors)
                .filter(|nbr| nbr.state >= nsm::State::Exchange)
                .map(|nbr| nbr.src)
                .collect()
        }
    };
    SendDestination::new(iface.config.ifindex, addrs, iface.send_ttl())
}
