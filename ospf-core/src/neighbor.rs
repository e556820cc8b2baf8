//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use nsm::{Event, State};
use ospf_utils::task::{IntervalTask, TimeoutTask};
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::collections::NeighborId;
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceUpView;
use crate::interface::{Interface, InterfaceType, ism};
use crate::output;
use crate::packet::DbDescFlags;
use crate::packet::lsa::{LsaHdr, LsaKey};
use crate::tasks;
use crate::tasks::messages::input::RxmtIntervalMsg;
use crate::tasks::messages::output::NetTxPacketMsg;

#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    pub router_id: Ipv4Addr,
    pub src: Ipv4Addr,
    pub priority: u8,
    pub dr: Option<Ipv4Addr>,
    pub bdr: Option<Ipv4Addr>,
    pub state: State,

    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub last_rcvd_dbdesc: Option<LastDbDesc>,
    pub last_sent_dbdesc: Option<NetTxPacketMsg>,

    pub event_count: u32,
    pub discontinuity_time: DateTime<Utc>,

    pub lists: NeighborLsaLists,
    pub tasks: NeighborTasks,
}

// Identification of the last received Database Description packet, used for
// duplicate detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LastDbDesc {
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
}

#[derive(Debug, Default)]
pub struct NeighborLsaLists {
    // LSA headers enqueued for transmission in Database Description packets.
    pub db_summary: BTreeMap<LsaKey, LsaHdr>,
    // LSAs that need to be received from this neighbor.
    pub ls_request: BTreeMap<LsaKey, LsaHdr>,
    // LSAs that were requested but not received yet.
    pub ls_request_pending: BTreeMap<LsaKey, LsaHdr>,
    // LSAs waiting to be acknowledged.
    pub ls_rxmt: BTreeMap<LsaKey, LsaHdr>,
}

#[derive(Debug, Default)]
pub struct NeighborTasks {
    pub inactivity_timer: Option<TimeoutTask>,
    pub poll_interval: Option<IntervalTask>,
    pub rxmt_dbdesc: Option<IntervalTask>,
    pub rxmt_lsreq: Option<IntervalTask>,
    pub rxmt_lsupd: Option<IntervalTask>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RxmtPacketType {
    DbDesc,
    LsRequest,
    LsUpdate,
}

// Neighbor state machine.
pub mod nsm {
    use serde::{Deserialize, Serialize};

    use super::RxmtPacketType;
    use crate::debug::SeqNoMismatchReason;

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        Start,
        HelloRcvd,
        TwoWayRcvd,
        OneWayRcvd,
        NegotiationDone,
        ExchangeDone,
        BadLsReq,
        SeqNoMismatch(SeqNoMismatchReason),
        LoadingDone,
        AdjOk,
        Kill,
        LinkDown,
        InactivityTimer,
        PollTimer,
        RxmtTimer(RxmtPacketType),
    }
}

// ===== impl Neighbor =====

impl Neighbor {
    pub(crate) fn new(
        id: NeighborId,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> Neighbor {
        Debug::NeighborCreate(router_id).log();

        // Initialize the DD Sequence Number.
        let dd_seq_no = {
            #[cfg(not(feature = "deterministic"))]
            {
                // Random value.
                use rand::RngCore;
                rand::rng().next_u32()
            }
            #[cfg(feature = "deterministic")]
            {
                // Fixed value for deterministic test results.
                router_id.into()
            }
        };

        Neighbor {
            id,
            router_id,
            src,
            priority: 0,
            dr: None,
            bdr: None,
            state: State::Down,
            dd_flags: DbDescFlags::empty(),
            dd_seq_no,
            last_rcvd_dbdesc: None,
            last_sent_dbdesc: None,
            event_count: 0,
            discontinuity_time: Utc::now(),
            lists: Default::default(),
            tasks: Default::default(),
        }
    }

    pub(crate) fn fsm(
        &mut self,
        iface: &mut Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
        event: Event,
    ) {
        Debug::NsmEvent(self.router_id, &self.state, &event).log();

        let new_state = match (self.state, &event) {
            // NSM (state, event) -> (Action, new state)
            (State::Down, Event::Start) => {
                self.poll_interval_stop();
                output::send_hello_direct(self, iface, area, instance);
                self.inactivity_timer_reset(iface, area, instance);
                Some(State::Attempt)
            }
            // NSM (state, event) -> (Action, new state)
            (State::Down, Event::PollTimer) => {
                // The poll interval task repeats on its own.
                output::send_hello_direct(self, iface, area, instance);
                None
            }
            // NSM (state, event) -> (Action, new state)
            (State::Down | State::Attempt, Event::HelloRcvd) => {
                self.poll_interval_stop();
                self.inactivity_timer_reset(iface, area, instance);
                Some(State::Init)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Init
                | State::TwoWay
                | State::ExStart
                | State::Exchange
                | State::Loading
                | State::Full,
                Event::HelloRcvd,
            ) => {
                self.inactivity_timer_reset(iface, area, instance);
                None
            }
            // NSM (state, event) -> (Action, new state)
            (State::Init, Event::TwoWayRcvd)
            | (State::TwoWay, Event::AdjOk) => {
                if iface.need_adjacency(self) {
                    self.dd_seq_no += 1;
                    self.dd_flags.insert(
                        DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
                    );
                    output::send_dbdesc(self, iface, area, instance);
                    self.rxmt_dbdesc_start(iface, area, instance, None);
                    Some(State::ExStart)
                } else {
                    Some(State::TwoWay)
                }
            }
            // NSM (state, event) -> (Action, new state)
            (State::ExStart, Event::NegotiationDone) => {
                // List the contents of the entire LSDB in the summary list.
                // MaxAge LSAs go straight to the retransmission list instead.
                for lsa_hdr in area.state.lsdb.iter() {
                    self.db_summary_add(*lsa_hdr);
                }
                // AS-external LSAs are not summarized over virtual links.
                if iface.config.if_type != InterfaceType::Virtual {
                    for lsa_hdr in instance.state.lsdb.iter() {
                        self.db_summary_add(*lsa_hdr);
                    }
                }
                self.rxmt_lsupd_start_check(iface, area, instance);

                self.dd_flags.remove(DbDescFlags::I);
                output::send_dbdesc(self, iface, area, instance);
                self.rxmt_dbdesc_stop();
                Some(State::Exchange)
            }
            // NSM (state, event) -> (Action, new state)
            (State::ExStart, Event::RxmtTimer(RxmtPacketType::DbDesc)) => {
                let _ = output::rxmt_dbdesc(self, iface, instance);
                None
            }
            // NSM (state, event) -> (Action, new state)
            (State::Exchange, Event::ExchangeDone) => {
                // The last sent Database Description packet must be kept
                // around for RouterDeadInterval seconds to answer duplicates
                // from the master; the retransmission task doubles as the
                // deadline for freeing it.
                let dead_interval = iface.config.dead_interval;
                self.rxmt_dbdesc_start(
                    iface,
                    area,
                    instance,
                    Some(dead_interval),
                );

                if self.lists.ls_request.is_empty()
                    && self.lists.ls_request_pending.is_empty()
                {
                    self.rxmt_lsreq_stop();
                    Some(State::Full)
                } else {
                    // Wait for outstanding LS Requests to be responded.
                    Some(State::Loading)
                }
            }
            // NSM (state, event) -> (Action, new state)
            (State::Loading, Event::LoadingDone) => {
                self.rxmt_lsreq_stop();
                Some(State::Full)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Loading | State::Full,
                Event::RxmtTimer(RxmtPacketType::DbDesc),
            ) => {
                // The exchange is over; discard the saved packet instead of
                // retransmitting it.
                self.last_sent_dbdesc = None;
                self.rxmt_dbdesc_stop();
                None
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::ExStart | State::Exchange | State::Loading | State::Full,
                Event::AdjOk,
            ) => {
                if iface.need_adjacency(self) {
                    None
                } else {
                    self.reset_adjacency();
                    Some(State::TwoWay)
                }
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Exchange | State::Loading | State::Full,
                Event::SeqNoMismatch(_) | Event::BadLsReq,
            ) => {
                self.reset_adjacency();
                self.dd_seq_no += 1;
                self.dd_flags
                    .insert(DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS);
                output::send_dbdesc(self, iface, area, instance);
                self.rxmt_dbdesc_start(iface, area, instance, None);
                Some(State::ExStart)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Exchange | State::Loading,
                Event::RxmtTimer(RxmtPacketType::LsRequest),
            ) => {
                output::rxmt_lsreq(self, iface, area, instance);
                None
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Exchange | State::Loading,
                Event::RxmtTimer(RxmtPacketType::LsUpdate),
            ) => {
                output::rxmt_lsupd(self, iface, area, instance);
                None
            }
            // NSM (state, event) -> (Action, new state)
            (_, Event::Kill | Event::LinkDown) => {
                self.reset_adjacency();
                self.tasks.inactivity_timer = None;
                self.poll_interval_stop();
                Some(State::Down)
            }
            // NSM (state, event) -> (Action, new state)
            (_, Event::InactivityTimer) => {
                self.reset_adjacency();
                self.tasks.inactivity_timer = None;

                // It may still be necessary to send Hello Packets to the
                // dead neighbor, at the reduced rate PollInterval.
                if iface.config.if_type == InterfaceType::NonBroadcast
                    && let Some(snbr) = iface.config.static_nbrs.get(&self.src)
                {
                    self.poll_interval_start(
                        iface,
                        area,
                        instance,
                        snbr.poll_interval,
                    );
                }
                Some(State::Down)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::TwoWay
                | State::ExStart
                | State::Exchange
                | State::Loading
                | State::Full,
                Event::OneWayRcvd,
            ) => {
                self.reset_adjacency();
                Some(State::Init)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::TwoWay
                | State::ExStart
                | State::Exchange
                | State::Loading
                | State::Full,
                Event::TwoWayRcvd,
            )
            | (State::Init, Event::OneWayRcvd) => {
                // No action required.
                None
            }
            // Catch-all wildcard.
            _ => {
                Error::NsmUnexpectedEvent(self.router_id, self.state, event)
                    .log();
                return;
            }
        };

        // Check for FSM state change.
        if let Some(new_state) = new_state
            && new_state != self.state
        {
            self.fsm_state_change(iface, area, instance, new_state);
        }
    }

    fn fsm_state_change(
        &mut self,
        iface: &mut Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
        new_state: State,
    ) {
        // Check for bidirectional communication change.
        if (new_state >= State::TwoWay && self.state < State::TwoWay
            || new_state < State::TwoWay && self.state >= State::TwoWay)
            && iface.is_broadcast_or_nbma()
        {
            // Trigger the NeighborChange event on broadcast/NBMA networks.
            instance.tx.protocol_input.ism_event(
                area.id,
                iface.id,
                ism::Event::NbrChange,
            );
        }

        // Effectively transition to the new FSM state.
        Debug::NsmTransition(self.router_id, &self.state, &new_state).log();
        self.state = new_state;

        // Update statistics.
        self.event_count += 1;
        self.discontinuity_time = Utc::now();
    }

    pub(crate) fn loading_done_check(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        // Check if all pending LSA requests were received.
        if self.lists.ls_request_pending.is_empty() {
            // Check if there are new LSAs to request.
            if !self.lists.ls_request.is_empty() {
                output::send_lsreq(self, iface, area, instance);
            } else if self.state == State::Loading {
                // Database loading has completed.
                instance.tx.protocol_input.nsm_event(
                    area.id,
                    iface.id,
                    self.id,
                    Event::LoadingDone,
                );
            }
        }
    }

    fn reset_adjacency(&mut self) {
        self.last_rcvd_dbdesc = None;
        self.last_sent_dbdesc = None;
        self.lists = Default::default();
        self.tasks.rxmt_dbdesc = None;
        self.tasks.rxmt_lsreq = None;
        self.tasks.rxmt_lsupd = None;
    }

    fn db_summary_add(&mut self, lsa_hdr: LsaHdr) {
        let lsa_key = lsa_hdr.key();
        if lsa_hdr.is_maxage() {
            self.lists.ls_rxmt.insert(lsa_key, lsa_hdr);
        } else {
            self.lists.db_summary.insert(lsa_key, lsa_hdr);
        }
    }

    pub(crate) fn dbdesc_is_dup(&self, dbdesc: &LastDbDesc) -> bool {
        self.last_rcvd_dbdesc
            .as_ref()
            .is_some_and(|last| last == dbdesc)
    }

    pub(crate) fn inactivity_timer_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        let task = tasks::nsm_inactivity_timer(self, iface, area, instance);
        self.tasks.inactivity_timer = Some(task);
    }

    fn inactivity_timer_reset(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        if let Some(inactivity_timer) = self.tasks.inactivity_timer.as_mut() {
            inactivity_timer.reset(None);
        } else {
            self.inactivity_timer_start(iface, area, instance);
        }
    }

    fn poll_interval_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
        poll_interval: u16,
    ) {
        let task =
            tasks::nbma_poll_interval(self, iface, area, instance, poll_interval);
        self.tasks.poll_interval = Some(task);
    }

    fn poll_interval_stop(&mut self) {
        self.tasks.poll_interval = None;
    }

    // (Re)starts the Database Description retransmission task. Once the
    // exchange has completed, it's restarted with the RouterDeadInterval
    // period to schedule the release of the saved packet.
    fn rxmt_dbdesc_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
        interval: Option<u16>,
    ) {
        let msg = RxmtIntervalMsg {
            area_key: area.id.into(),
            iface_key: iface.id.into(),
            nbr_key: self.id.into(),
            packet_type: RxmtPacketType::DbDesc,
        };

        let interval = interval.unwrap_or(iface.config.retransmit_interval);
        let task = tasks::packet_rxmt_interval(msg, instance, interval);
        self.tasks.rxmt_dbdesc = Some(task);
    }

    fn rxmt_dbdesc_stop(&mut self) {
        self.tasks.rxmt_dbdesc = None;
    }

    pub(crate) fn rxmt_lsreq_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        let msg = RxmtIntervalMsg {
            area_key: area.id.into(),
            iface_key: iface.id.into(),
            nbr_key: self.id.into(),
            packet_type: RxmtPacketType::LsRequest,
        };

        let task = tasks::packet_rxmt_interval(
            msg,
            instance,
            iface.config.retransmit_interval,
        );
        self.tasks.rxmt_lsreq = Some(task);
    }

    fn rxmt_lsreq_stop(&mut self) {
        self.tasks.rxmt_lsreq = None;
    }

    pub(crate) fn rxmt_lsupd_start_check(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        if !self.lists.ls_rxmt.is_empty() && self.tasks.rxmt_lsupd.is_none() {
            let msg = RxmtIntervalMsg {
                area_key: area.id.into(),
                iface_key: iface.id.into(),
                nbr_key: self.id.into(),
                packet_type: RxmtPacketType::LsUpdate,
            };
            let task = tasks::packet_rxmt_interval(
                msg,
                instance,
                iface.config.retransmit_interval,
            );
            self.tasks.rxmt_lsupd = Some(task);
        }
    }

    pub(crate) fn rxmt_lsupd_stop_check(&mut self) {
        if self.lists.ls_rxmt.is_empty() && self.tasks.rxmt_lsupd.is_some() {
            self.tasks.rxmt_lsupd = None;
        }
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        Debug::NeighborDelete(self.router_id).log();
    }
}
