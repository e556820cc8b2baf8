//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::btree_map;
use std::net::Ipv4Addr;

use crate::area::Area;
use crate::collections::{
    Arena, AreaIndex, AreaKey, InterfaceIndex, InterfaceKey, NeighborIndex,
    NeighborKey,
};
use crate::debug::{Debug, SeqNoMismatchReason};
use crate::error::{Error, InterfaceCfgError};
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::{Interface, ism};
use crate::lsdb;
use crate::neighbor::{LastDbDesc, Neighbor, RxmtPacketType, nsm};
use crate::network::MulticastAddr;
use crate::output;
use crate::packet::lsa::{LsaScope, lsa_compare};
use crate::packet::{
    auth, DbDescFlags, DbDescPacket, HelloPacket, LsAckPacket,
    LsRequestPacket, LsUpdatePacket, OSPF_VERSION, Packet, PacketType,
};

// ===== Interface FSM event =====

pub(crate) fn process_ism_event(
    instance: &InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    event: ism::Event,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;

    // Invoke FSM event.
    iface.fsm(area, instance, &mut arenas.neighbors, event);

    Ok(())
}

// ===== Neighbor FSM event =====

pub(crate) fn process_nsm_event(
    instance: &InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    nbr_key: NeighborKey,
    event: nsm::Event,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;
    let (nbr_idx, nbr) = iface
        .state
        .neighbors
        .get_mut_by_key(&mut arenas.neighbors, &nbr_key)?;

    // Invoke FSM event.
    nbr.fsm(iface, area, instance, event);

    // Neighbors driven down by Kill/LinkDown are deleted right away.
    // Neighbors that reached Down through the Inactivity Timer stay in the
    // neighbor table so they can be polled (NBMA) or restarted.
    if nbr.state == nsm::State::Down
        && matches!(event, nsm::Event::Kill | nsm::Event::LinkDown)
    {
        iface.state.neighbors.delete(&mut arenas.neighbors, nbr_idx);
    }

    Ok(())
}

// ===== Network packet receipt =====

pub(crate) fn process_packet(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    ifindex: u32,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    packet: Packet,
) -> Result<(), Error> {
    let hdr = *packet.hdr();

    // A router receiving its own transmission (e.g. over a broadcast
    // medium) must not process it.
    if hdr.router_id == instance.state.router_id {
        Debug::PacketRxSelfOriginated(hdr.router_id).log();
        return Ok(());
    }

    // RFC 2328, Section 8.2: the packet's OSPF version must match. Checked
    // before any area or interface lookup takes place.
    if hdr.version != OSPF_VERSION {
        return Err(Error::VersionMismatch(hdr.version));
    }

    // Resolve the area by the packet's Area ID.
    let (area_idx, area) = arenas
        .areas
        .get_by_area_id(hdr.area_id)
        .ok_or(Error::AreaMismatch(hdr.area_id, src))?;

    // Resolve the receiving interface within that area. When no interface
    // matches directly, the packet is accepted only over a virtual link:
    // the packet must belong to the backbone, the source router must be the
    // configured endpoint of one of the area's virtual links, and the
    // receiving interface must attach to that virtual link's transit area.
    let iface_idx = match area
        .interfaces
        .get_by_ifindex(&arenas.interfaces, ifindex)
    {
        Some((iface_idx, _)) => iface_idx,
        None => {
            let vlink = if area.is_backbone() && arenas.areas.count() > 1 {
                area.find_virtual_link(hdr.router_id, &arenas.interfaces)
                    .filter(|(_, vlink)| {
                        vlink.config.transit_area_id.is_some_and(
                            |transit_area_id| {
                                arenas
                                    .areas
                                    .get_by_area_id(transit_area_id)
                                    .is_some_and(|(_, transit_area)| {
                                        transit_area
                                            .interfaces
                                            .get_by_ifindex(
                                                &arenas.interfaces,
                                                ifindex,
                                            )
                                            .is_some()
                                    })
                            },
                        )
                    })
            } else {
                None
            };

            let (iface_idx, _) =
                vlink.ok_or(Error::NoMatchingInterface(ifindex, src))?;
            iface_idx
        }
    };
    let iface = &arenas.interfaces[iface_idx];

    // Ignore packets received on inoperational or passive interfaces.
    if iface.is_down() || iface.is_passive() {
        return Ok(());
    }

    // If the destination is the AllDRouters multicast group, the receiving
    // interface must be in DesignatedRouter or Backup state.
    if dst == MulticastAddr::AllDrRtrs.addr()
        && !matches!(
            iface.state.ism_state,
            ism::State::Dr | ism::State::Backup
        )
    {
        return Err(Error::InvalidDstState(src, iface.state.ism_state));
    }

    // Packet authentication.
    if !auth::authenticate(&hdr, &iface.config.auth) {
        return Err(Error::AuthError(src));
    }

    // Log received packet.
    Debug::PacketRx(iface, &src, &dst, &packet).log();

    if let Packet::Hello(pkt) = packet {
        let area = &arenas.areas[area_idx];
        let iface = &mut arenas.interfaces[iface_idx];
        process_packet_hello(
            iface,
            area,
            instance,
            &mut arenas.neighbors,
            src,
            pkt,
        )
    } else {
        // Non-Hello packets not matching any active neighbor are discarded.
        let area = &arenas.areas[area_idx];
        let iface = &mut arenas.interfaces[iface_idx];
        let (nbr_idx, _) = iface
            .get_neighbor(src, hdr.router_id, &mut arenas.neighbors)
            .ok_or(Error::UnknownNeighbor(src, hdr.router_id))?;

        match packet {
            Packet::Hello(_) => unreachable!(),
            Packet::DbDesc(pkt) => {
                let nbr = &mut arenas.neighbors[nbr_idx];
                process_packet_dbdesc(nbr, iface, area, instance, src, pkt)
            }
            Packet::LsRequest(pkt) => {
                let nbr = &mut arenas.neighbors[nbr_idx];
                process_packet_lsreq(nbr, iface, area, instance, pkt)
            }
            Packet::LsUpdate(pkt) => process_packet_lsupd(
                nbr_idx, iface_idx, area_idx, instance, arenas, pkt,
            ),
            Packet::LsAck(pkt) => {
                let nbr = &mut arenas.neighbors[nbr_idx];
                process_packet_lsack(nbr, pkt)
            }
        }
    }
}

fn process_packet_hello(
    iface: &mut Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    neighbors: &mut Arena<Neighbor>,
    src: Ipv4Addr,
    hello: HelloPacket,
) -> Result<(), Error> {
    let protocol_input = &instance.tx.protocol_input;
    let router_id = hello.hdr.router_id;

    // Perform all the required sanity checks.
    process_packet_hello_sanity_checks(iface, instance, &hello).map_err(
        |error| {
            Error::InterfaceCfgError(
                iface.name.clone(),
                src,
                PacketType::Hello,
                error,
            )
        },
    )?;

    // Find or create new neighbor.
    let nbr_idx = match iface
        .get_neighbor(src, router_id, neighbors)
        .map(|(nbr_idx, _)| nbr_idx)
    {
        Some(nbr_idx) => nbr_idx,
        None => {
            // Create new neighbor.
            let (nbr_idx, nbr) =
                iface.state.neighbors.insert(neighbors, router_id, src);

            // Initialize neighbor values.
            nbr.priority = hello.priority;
            if iface.is_broadcast_or_nbma() {
                nbr.dr = hello.dr;
                nbr.bdr = hello.bdr;
            }

            nbr_idx
        }
    };
    let nbr = &mut neighbors[nbr_idx];

    // Update neighbor's source address.
    //
    // This can only happen on point-to-point interfaces (for the other
    // interface types, an address change would prompt the creation of a
    // different neighbor entity).
    if nbr.src != src {
        let old_src = nbr.src;
        nbr.src = src;
        iface.state.neighbors.update_src(nbr_idx, old_src, src);
    }

    // Trigger the HelloReceived event.
    nbr.fsm(iface, area, instance, nsm::Event::HelloRcvd);

    // Trigger the 1-WayReceived or the 2-WayReceived event.
    if hello.neighbors.contains(&instance.state.router_id) {
        nbr.fsm(iface, area, instance, nsm::Event::TwoWayRcvd);
    } else {
        nbr.fsm(iface, area, instance, nsm::Event::OneWayRcvd);

        // Update neighbor values.
        if iface.is_broadcast_or_nbma() {
            nbr.priority = hello.priority;
            nbr.dr = hello.dr;
            nbr.bdr = hello.bdr;
        }

        return Ok(());
    }

    // Examine rest of the Hello Packet (ignore Point-to-MultiPoint
    // interfaces as per errata 4022 of RFC 2328).
    if iface.is_broadcast_or_nbma() {
        // Check for Router Priority change.
        if hello.priority != nbr.priority {
            nbr.priority = hello.priority;
            protocol_input.ism_event(area.id, iface.id, ism::Event::NbrChange);
        }

        // Check for DR/BDR changes.
        let nbr_addr = nbr.src;
        if iface.state.ism_state == ism::State::Waiting
            && ((hello.dr == Some(nbr_addr) && hello.bdr.is_none())
                || hello.bdr == Some(nbr_addr))
        {
            protocol_input.ism_event(
                area.id,
                iface.id,
                ism::Event::BackupSeen,
            );
        }
        if (hello.dr == Some(nbr_addr)) != (nbr.dr == Some(nbr_addr))
            || (hello.bdr == Some(nbr_addr)) != (nbr.bdr == Some(nbr_addr))
        {
            protocol_input.ism_event(area.id, iface.id, ism::Event::NbrChange);
        }

        // Update neighbor's DR/BDR.
        nbr.dr = hello.dr;
        nbr.bdr = hello.bdr;
    }

    Ok(())
}

fn process_packet_hello_sanity_checks(
    iface: &Interface,
    instance: &InstanceUpView<'_>,
    hello: &HelloPacket,
) -> Result<(), InterfaceCfgError> {
    // Check for network mask mismatch. The mask is ignored on
    // point-to-point and virtual links.
    if iface.is_broadcast_or_nbma()
        && let Some(addr) = iface.config.addr
        && hello.network_mask != addr.mask()
    {
        return Err(InterfaceCfgError::HelloMaskMismatch(
            hello.network_mask,
            addr.mask(),
        ));
    }

    // Check for HelloInterval mismatch.
    if hello.hello_interval != iface.config.hello_interval {
        return Err(InterfaceCfgError::HelloIntervalMismatch(
            hello.hello_interval,
            iface.config.hello_interval,
        ));
    }

    // Check for RouterDeadInterval mismatch.
    if hello.dead_interval != u32::from(iface.config.dead_interval) {
        return Err(InterfaceCfgError::DeadIntervalMismatch(
            hello.dead_interval,
            iface.config.dead_interval.into(),
        ));
    }

    // Check for duplicate Router ID.
    if hello.hdr.router_id == instance.state.router_id {
        return Err(InterfaceCfgError::DuplicateRouterId(hello.hdr.router_id));
    }

    Ok(())
}

fn process_packet_dbdesc(
    nbr: &mut Neighbor,
    iface: &mut Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    src: Ipv4Addr,
    dbdesc: DbDescPacket,
) -> Result<(), Error> {
    // MTU mismatch check.
    if dbdesc.mtu > iface.config.mtu {
        return Err(Error::InterfaceCfgError(
            iface.name.clone(),
            src,
            PacketType::DbDesc,
            InterfaceCfgError::MtuMismatch(dbdesc.mtu),
        ));
    }

    let last = LastDbDesc {
        dd_flags: dbdesc.dd_flags,
        dd_seq_no: dbdesc.dd_seq_no,
    };

    // Further processing depends on the neighbor's state.
    match nbr.state {
        nsm::State::Down | nsm::State::Attempt => {
            Err(Error::DbDescReject(nbr.router_id, nbr.state))
        }
        nsm::State::TwoWay => {
            Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
            Ok(())
        }
        nsm::State::Init | nsm::State::ExStart => {
            if nbr.state == nsm::State::Init {
                nbr.fsm(iface, area, instance, nsm::Event::TwoWayRcvd);
                if nbr.state != nsm::State::ExStart {
                    return Ok(());
                }
                // Fall through to the ExStart case.
            }

            if dbdesc.dd_flags.contains(
                DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
            ) && dbdesc.lsa_hdrs.is_empty()
                && dbdesc.hdr.router_id > instance.state.router_id
            {
                // This router is the slave. Set the master/slave bit to
                // slave, and adopt the DD sequence number specified by the
                // master.
                nbr.dd_flags.remove(DbDescFlags::MS);
                nbr.dd_seq_no = dbdesc.dd_seq_no;
            } else if !dbdesc
                .dd_flags
                .intersects(DbDescFlags::I | DbDescFlags::MS)
                && dbdesc.dd_seq_no == nbr.dd_seq_no
                && dbdesc.hdr.router_id < instance.state.router_id
            {
                // This router is the master. The neighbor echoed our
                // sequence number; advance it for the first real exchange
                // packet.
                nbr.dd_seq_no += 1;
            } else {
                // Ignore the packet.
                return Ok(());
            }

            nbr.last_rcvd_dbdesc = Some(last);
            nbr.fsm(iface, area, instance, nsm::Event::NegotiationDone);
            dbdesc_exchange(nbr, iface, area, instance, &dbdesc, true);
            Ok(())
        }
        nsm::State::Exchange => {
            // Check for duplicate packet.
            if nbr.dbdesc_is_dup(&last) {
                // The slave needs to retransmit the last Database
                // Description packet that it had sent.
                if !nbr.dd_flags.contains(DbDescFlags::MS) {
                    let _ = output::rxmt_dbdesc(nbr, iface, instance);
                }

                return Ok(());
            }

            // Sanity checks.
            let last_rcvd_dbdesc = nbr.last_rcvd_dbdesc.as_ref().unwrap();
            if dbdesc.dd_flags.contains(DbDescFlags::I)
                || dbdesc.dd_flags.contains(DbDescFlags::MS)
                    != last_rcvd_dbdesc.dd_flags.contains(DbDescFlags::MS)
            {
                let reason = SeqNoMismatchReason::InconsistentFlags;
                nbr.fsm(iface, area, instance, nsm::Event::SeqNoMismatch(reason));
                return Ok(());
            }
            if (nbr.dd_flags.contains(DbDescFlags::MS)
                && dbdesc.dd_seq_no != nbr.dd_seq_no)
                || (!nbr.dd_flags.contains(DbDescFlags::MS)
                    && dbdesc.dd_seq_no != nbr.dd_seq_no + 1)
            {
                let reason = SeqNoMismatchReason::InconsistentSeqNo;
                nbr.fsm(iface, area, instance, nsm::Event::SeqNoMismatch(reason));
                return Ok(());
            }

            nbr.last_rcvd_dbdesc = Some(last);
            dbdesc_exchange(nbr, iface, area, instance, &dbdesc, false);
            Ok(())
        }
        nsm::State::Loading | nsm::State::Full => {
            // Check for duplicate packet.
            if nbr.dbdesc_is_dup(&last) {
                // The slave must respond to duplicates by repeating the
                // last Database Description packet that it had sent. If
                // that packet was already freed, the exchange must be
                // restarted.
                if !nbr.dd_flags.contains(DbDescFlags::MS)
                    && !output::rxmt_dbdesc(nbr, iface, instance)
                {
                    let reason = SeqNoMismatchReason::UnexpectedDbDesc;
                    nbr.fsm(
                        iface,
                        area,
                        instance,
                        nsm::Event::SeqNoMismatch(reason),
                    );
                }

                return Ok(());
            }

            let reason = SeqNoMismatchReason::UnexpectedDbDesc;
            nbr.fsm(iface, area, instance, nsm::Event::SeqNoMismatch(reason));
            Ok(())
        }
    }
}

// Common Database Description packet processing for the ExStart and
// Exchange states (RFC 2328, Section 10.6, steps 7-8).
//
// When invoked from the ExStart state, the first post-negotiation packet
// was just sent by the NegotiationDone action, so only the packet contents
// are examined here.
fn dbdesc_exchange(
    nbr: &mut Neighbor,
    iface: &mut Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    dbdesc: &DbDescPacket,
    in_exchange_start: bool,
) {
    // Now iterate over all LSA headers.
    for lsa_hdr in &dbdesc.lsa_hdrs {
        let lsa_key = lsa_hdr.key();

        // RFC 5243 says:
        // "If the Database summary list contains an instance of the LSA
        // that is the same as or less recent than the listed LSA, the LSA
        // is removed from the Database summary list".
        if let btree_map::Entry::Occupied(o) =
            nbr.lists.db_summary.entry(lsa_key)
            && lsa_compare(o.get(), lsa_hdr) != Ordering::Greater
        {
            o.remove();
        }

        // Put the LSA on the Link state request list if it's not present
        // on the LSDB, or if the local copy is less recent than the
        // received one.
        let lsdb = match lsa_hdr.lsa_type.scope() {
            LsaScope::Area => &area.state.lsdb,
            LsaScope::As => &instance.state.lsdb,
        };
        if let Some(local) = lsdb.get(&lsa_key)
            && lsa_compare(local, lsa_hdr) != Ordering::Less
        {
            continue;
        }
        nbr.lists.ls_request.insert(lsa_key, *lsa_hdr);
    }

    // Start sending Link State Request packets.
    if !nbr.lists.ls_request.is_empty()
        && nbr.lists.ls_request_pending.is_empty()
    {
        output::send_lsreq(nbr, iface, area, instance);
    }

    // Further processing depends on whether the router is master or slave.
    if !in_exchange_start {
        if nbr.dd_flags.contains(DbDescFlags::MS) {
            // The neighbor acknowledged our last packet.
            nbr.dd_seq_no += 1;

            if nbr.lists.db_summary.is_empty()
                && !dbdesc.dd_flags.contains(DbDescFlags::M)
            {
                nbr.fsm(iface, area, instance, nsm::Event::ExchangeDone);
            } else {
                output::send_dbdesc(nbr, iface, area, instance);
            }
        } else {
            // Respond to the master.
            nbr.dd_seq_no = dbdesc.dd_seq_no;
            output::send_dbdesc(nbr, iface, area, instance);

            if !dbdesc.dd_flags.contains(DbDescFlags::M)
                && nbr.lists.db_summary.is_empty()
            {
                nbr.fsm(iface, area, instance, nsm::Event::ExchangeDone);
            }
        }
    }
}

fn process_packet_lsreq(
    nbr: &mut Neighbor,
    iface: &mut Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    ls_req: LsRequestPacket,
) -> Result<(), Error> {
    if nbr.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
        return Ok(());
    }

    // Iterate over all request entries.
    let mut lsas = vec![];
    for lsa_key in &ls_req.entries {
        // Locate LSA in the LSDB.
        let lsdb = match lsa_key.lsa_type.scope() {
            LsaScope::Area => &area.state.lsdb,
            LsaScope::As => &instance.state.lsdb,
        };

        match lsdb.get(lsa_key) {
            Some(lsa_hdr) => {
                // Copy LSA for transmission to the neighbor.
                lsas.push(*lsa_hdr);
            }
            None => {
                // Something has gone wrong with the Database Exchange
                // process.
                nbr.fsm(iface, area, instance, nsm::Event::BadLsReq);
                return Ok(());
            }
        }
    }

    // Send the requested LSAs directly to the neighbor.
    if !lsas.is_empty() {
        output::send_lsupd_direct(nbr, iface, area, instance, lsas);
    }

    Ok(())
}

fn process_packet_lsupd(
    nbr_idx: NeighborIndex,
    iface_idx: InterfaceIndex,
    area_idx: AreaIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    ls_upd: LsUpdatePacket,
) -> Result<(), Error> {
    let nbr = &mut arenas.neighbors[nbr_idx];
    if nbr.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
        return Ok(());
    }

    // Process all LSAs contained in the packet.
    for lsa_hdr in ls_upd.lsas {
        let lsa_key = lsa_hdr.key();

        // Install the LSA in the link state database, unless the local
        // copy is more recent.
        match lsa_hdr.lsa_type.scope() {
            LsaScope::Area => {
                arenas.areas[area_idx].state.lsdb.install(lsa_hdr)
            }
            LsaScope::As => instance.state.lsdb.install(lsa_hdr),
        }

        // Retire the LSA from the request lists.
        nbr.lists.ls_request.remove(&lsa_key);
        nbr.lists.ls_request_pending.remove(&lsa_key);

        // The receipt of a same-or-newer instance also acknowledges any
        // pending retransmission of this LSA.
        if let btree_map::Entry::Occupied(o) =
            nbr.lists.ls_rxmt.entry(lsa_key)
            && lsa_compare(o.get(), &lsa_hdr) != Ordering::Greater
        {
            o.remove();
        }

        // Enqueue a delayed acknowledgment.
        let iface = &mut arenas.interfaces[iface_idx];
        iface.state.ls_ack_list.insert(lsa_key, lsa_hdr);
    }
    nbr.rxmt_lsupd_stop_check();

    // Schedule transmission of the delayed acknowledgments.
    let iface = &mut arenas.interfaces[iface_idx];
    let area = &arenas.areas[area_idx];
    iface.delayed_ack_start_check(area, instance);

    // Check if the database loading has completed.
    nbr.loading_done_check(iface, area, instance);

    Ok(())
}

fn process_packet_lsack(
    nbr: &mut Neighbor,
    ls_ack: LsAckPacket,
) -> Result<(), Error> {
    // Iterate over all LSA headers.
    for lsa_hdr in &ls_ack.lsa_hdrs {
        // Remove the acknowledged LSA from the retransmission list,
        // provided the acknowledgment matches the retransmitted instance.
        if let btree_map::Entry::Occupied(o) =
            nbr.lists.ls_rxmt.entry(lsa_hdr.key())
            && lsa_compare(o.get(), lsa_hdr) == Ordering::Equal
        {
            o.remove();
        }
    }
    nbr.rxmt_lsupd_stop_check();

    Ok(())
}

// ===== Packet retransmission interval =====

pub(crate) fn process_packet_rxmt(
    instance: &InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    nbr_key: NeighborKey,
    packet_type: RxmtPacketType,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;
    let (_, nbr) = iface
        .state
        .neighbors
        .get_mut_by_key(&mut arenas.neighbors, &nbr_key)?;

    // Invoke FSM event.
    nbr.fsm(iface, area, instance, nsm::Event::RxmtTimer(packet_type));

    Ok(())
}

// ===== Delayed Ack timeout =====

pub(crate) fn process_delayed_ack_timeout(
    instance: &InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;

    // Send delayed acknowledgments and stop the timeout.
    iface.state.tasks.ls_delayed_ack = None;
    output::send_lsack_delayed(iface, area, instance, &arenas.neighbors);

    Ok(())
}

// ===== Database aging =====

pub(crate) fn process_database_age(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    let mut expired = instance.state.lsdb.age(lsdb::AGE_SWEEP_INTERVAL);
    for area in arenas.areas.iter_mut() {
        expired += area.state.lsdb.age(lsdb::AGE_SWEEP_INTERVAL);
    }
    Debug::DatabaseAge(expired).log();

    Ok(())
}
