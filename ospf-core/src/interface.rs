//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use ism::{Event, State};
use ospf_utils::task::{IntervalTask, TimeoutTask};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::area::Area;
use crate::collections::{Arena, InterfaceId, NeighborIndex, Neighbors};
use crate::debug::{Debug, InterfaceInactiveReason};
use crate::error::Error;
use crate::instance::InstanceUpView;
use crate::neighbor::{Neighbor, nsm};
use crate::network::{
    DEFAULT_TTL, MulticastAddr, SendDestination, VIRTUAL_LINK_TTL,
};
use crate::output;
use crate::packet::auth::AuthCfg;
use crate::packet::lsa::{LsaHdr, LsaKey};
use crate::tasks;
use crate::tasks::messages::output::NetTxPacketMsg;

#[derive(Debug)]
pub struct Interface {
    pub id: InterfaceId,
    pub name: String,
    pub config: InterfaceCfg,
    pub state: InterfaceState,
}

#[derive(Clone, Debug)]
pub struct InterfaceCfg {
    // Interface ifindex.
    pub ifindex: u32,
    pub if_type: InterfaceType,
    // OSPFv2: primary address.
    pub addr: Option<Ipv4Network>,
    pub mtu: u16,
    pub priority: u8,
    pub hello_interval: u16,
    pub dead_interval: u16,
    pub retransmit_interval: u16,
    pub passive: bool,
    pub auth: AuthCfg,
    // NBMA and Point-to-MultiPoint neighbors.
    pub static_nbrs: BTreeMap<Ipv4Addr, StaticNeighbor>,
    // Virtual link endpoint configuration.
    pub transit_area_id: Option<Ipv4Addr>,
    pub vlink_peer: Option<Ipv4Addr>,
    pub vlink_peer_addr: Option<Ipv4Addr>,
}

#[derive(Clone, Copy, Debug)]
pub struct StaticNeighbor {
    pub priority: u8,
    pub poll_interval: u16,
}

#[derive(Debug, Default)]
pub struct InterfaceState {
    // ISM state.
    pub ism_state: State,
    // Source address used when sending packets.
    pub src_addr: Option<Ipv4Addr>,
    // The network DR/BDR, identified by interface address.
    pub dr: Option<Ipv4Addr>,
    pub bdr: Option<Ipv4Addr>,
    // List of neighbors attached to this interface.
    pub neighbors: Neighbors,
    // List of pending delayed Acks.
    pub ls_ack_list: BTreeMap<LsaKey, LsaHdr>,
    // Statistics.
    pub event_count: u32,
    pub discontinuity_time: Option<DateTime<Utc>>,
    // Tasks.
    pub tasks: InterfaceTasks,
}

#[derive(Debug, Default)]
pub struct InterfaceTasks {
    // ISM Hello Tx interval task.
    pub hello_interval: Option<IntervalTask>,
    // ISM WaitTimer task.
    pub wait_timer: Option<TimeoutTask>,
    // Delayed Ack task.
    pub ls_delayed_ack: Option<TimeoutTask>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterfaceType {
    PointToPoint,
    Broadcast,
    NonBroadcast,
    PointToMultipoint,
    Virtual,
}

#[derive(Clone, Copy, Debug)]
struct DrCandidate {
    addr: Ipv4Addr,
    priority: u8,
    dr: Option<Ipv4Addr>,
    bdr: Option<Ipv4Addr>,
}

// Interface state machine.
pub mod ism {
    use serde::{Deserialize, Serialize};

    use crate::debug::InterfaceInactiveReason;

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Waiting,
        PointToPoint,
        DrOther,
        Backup,
        Dr,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        InterfaceUp,
        HelloTimer,
        WaitTimer,
        BackupSeen,
        NbrChange,
        InterfaceDown(InterfaceInactiveReason),
    }
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(name: String, config: InterfaceCfg) -> Interface {
        Debug::InterfaceCreate(&name).log();

        Interface {
            id: 0,
            name,
            config,
            state: InterfaceState::default(),
        }
    }

    pub(crate) fn fsm(
        &mut self,
        area: &Area,
        instance: &InstanceUpView<'_>,
        neighbors: &mut Arena<Neighbor>,
        event: Event,
    ) {
        Debug::IsmEvent(&self.name, &self.state.ism_state, &event).log();

        let new_ism_state = match (self.state.ism_state, &event) {
            // ISM (state, event) -> (Action, new state)
            (State::Down, Event::InterfaceUp) => {
                Some(self.start(area, instance, neighbors))
            }
            // ISM (state, event) -> (Action, new state)
            (
                State::Waiting
                | State::PointToPoint
                | State::DrOther
                | State::Backup
                | State::Dr,
                Event::HelloTimer,
            ) => {
                let dst = self.hello_destination();
                output::send_hello(self, area, instance, dst);
                None
            }
            // ISM (state, event) -> (Action, new state)
            (State::Waiting, Event::BackupSeen | Event::WaitTimer) => {
                self.state.tasks.wait_timer = None;
                Some(self.dr_election(area, instance, neighbors))
            }
            // ISM (state, event) -> (Action, new state)
            (State::DrOther | State::Backup | State::Dr, Event::NbrChange) => {
                Some(self.dr_election(area, instance, neighbors))
            }
            // ISM (state, event) -> (Action, new state)
            (_, Event::InterfaceDown(reason)) => {
                self.stop(area, instance, neighbors, *reason);
                Some(State::Down)
            }
            // Catch-all wildcard.
            _ => {
                Error::IsmUnexpectedEvent(self.state.ism_state, event).log();
                return;
            }
        };

        // Check for FSM state change.
        if let Some(new_ism_state) = new_ism_state
            && new_ism_state != self.state.ism_state
        {
            Debug::IsmTransition(
                &self.name,
                &self.state.ism_state,
                &new_ism_state,
            )
            .log();
            self.state.ism_state = new_ism_state;

            // Update statistics.
            self.state.event_count += 1;
            self.state.discontinuity_time = Some(Utc::now());
        }
    }

    fn start(
        &mut self,
        area: &Area,
        instance: &InstanceUpView<'_>,
        neighbors: &Arena<Neighbor>,
    ) -> State {
        Debug::InterfaceStart(&self.name).log();

        // Initialize source address.
        self.state.src_addr = self.config.addr.map(|addr| addr.ip());

        // Start Hello Tx task.
        if !self.config.passive {
            let task = tasks::hello_interval(self, area, instance);
            self.state.tasks.hello_interval = Some(task);
        }

        // Get new ISM state.
        let new_ism_state = match self.config.if_type {
            InterfaceType::PointToPoint
            | InterfaceType::PointToMultipoint
            | InterfaceType::Virtual => State::PointToPoint,
            InterfaceType::Broadcast | InterfaceType::NonBroadcast => {
                if self.config.priority == 0 {
                    State::DrOther
                } else {
                    State::Waiting
                }
            }
        };

        if new_ism_state == State::Waiting {
            // Start wait timer.
            let task = tasks::ism_wait_timer(self, area, instance);
            self.state.tasks.wait_timer = Some(task);

            if self.config.if_type == InterfaceType::NonBroadcast {
                // Examine the configured list of neighbors for this interface
                // and generate the neighbor event Start for each neighbor
                // that is also eligible to become Designated Router.
                for nbr in self
                    .config
                    .static_nbrs
                    .iter()
                    .filter(|(_, snbr)| snbr.priority != 0)
                    .filter_map(|(addr, _)| {
                        self.state
                            .neighbors
                            .iter(neighbors)
                            .find(|nbr| nbr.src == *addr)
                    })
                {
                    instance.tx.protocol_input.nsm_event(
                        area.id,
                        self.id,
                        nbr.id,
                        nsm::Event::Start,
                    );
                }
            }
        }

        new_ism_state
    }

    // Stop interface if it's active.
    fn stop(
        &mut self,
        area: &Area,
        instance: &InstanceUpView<'_>,
        neighbors: &mut Arena<Neighbor>,
        reason: InterfaceInactiveReason,
    ) {
        if self.is_down() {
            return;
        }

        Debug::InterfaceStop(&self.name, reason).log();

        // Kill all neighbors.
        let event = match reason {
            InterfaceInactiveReason::OperationalDown => nsm::Event::LinkDown,
            _ => nsm::Event::Kill,
        };
        for nbr_idx in self.state.neighbors.indexes().collect::<Vec<_>>() {
            let nbr = &mut neighbors[nbr_idx];
            nbr.fsm(self, area, instance, event);
            self.state.neighbors.delete(neighbors, nbr_idx);
        }

        // Reset interface state.
        self.state.src_addr = None;
        self.state.dr = None;
        self.state.bdr = None;
        self.state.neighbors = Default::default();
        self.state.ls_ack_list = Default::default();
        self.state.tasks = Default::default();
    }

    // DR/BDR election (RFC 2328, Section 9.4, compact form: when no router
    // has declared itself Designated Router, the elected Backup is promoted
    // without re-running the Backup election).
    fn dr_election(
        &mut self,
        area: &Area,
        instance: &InstanceUpView<'_>,
        neighbors: &mut Arena<Neighbor>,
    ) -> State {
        // Gather the election candidates: this router plus all neighbors
        // that reached bidirectional communication.
        let my_addr = self.state.src_addr;
        let mut candidates = Vec::new();
        if self.config.priority > 0
            && let Some(addr) = my_addr
        {
            candidates.push(DrCandidate {
                addr,
                priority: self.config.priority,
                dr: self.state.dr,
                bdr: self.state.bdr,
            });
        }
        for nbr in self
            .state
            .neighbors
            .iter(neighbors)
            .filter(|nbr| nbr.state >= nsm::State::TwoWay)
            .filter(|nbr| nbr.priority > 0)
        {
            candidates.push(DrCandidate {
                addr: nbr.src,
                priority: nbr.priority,
                dr: nbr.dr,
                bdr: nbr.bdr,
            });
        }

        let old_dr = self.state.dr;
        let old_bdr = self.state.bdr;
        let (mut new_dr, mut new_bdr) = Self::elect(&candidates);

        // If this router's own role changed, repeat the election once with
        // the updated self-declaration (RFC 2328, Section 9.4, step 4).
        let self_changed = my_addr.is_some_and(|addr| {
            (new_dr == Some(addr)) != (old_dr == Some(addr))
                || (new_bdr == Some(addr)) != (old_bdr == Some(addr))
        });
        if self_changed {
            if let Some(cand) =
                candidates.iter_mut().find(|cand| Some(cand.addr) == my_addr)
            {
                cand.dr = new_dr;
                cand.bdr = new_bdr;
            }
            (new_dr, new_bdr) = Self::elect(&candidates);
        }

        Debug::IsmDrElection(&self.name, old_dr, new_dr, old_bdr, new_bdr)
            .log();
        self.state.dr = new_dr;
        self.state.bdr = new_bdr;

        // Get new ISM state.
        let new_ism_state = if my_addr.is_some() && new_dr == my_addr {
            State::Dr
        } else if my_addr.is_some() && new_bdr == my_addr {
            State::Backup
        } else {
            State::DrOther
        };

        // A DR/BDR change affects which neighbors should be adjacent.
        if old_dr != new_dr || old_bdr != new_bdr {
            for nbr_idx in self.state.neighbors.indexes().collect::<Vec<_>>() {
                let nbr = &mut neighbors[nbr_idx];
                if nbr.state >= nsm::State::TwoWay {
                    nbr.fsm(self, area, instance, nsm::Event::AdjOk);
                }
            }
        }

        new_ism_state
    }

    fn elect(
        candidates: &[DrCandidate],
    ) -> (Option<Ipv4Addr>, Option<Ipv4Addr>) {
        // Calculate the Backup Designated Router: routers declaring
        // themselves Backup have precedence over the remaining ones, and
        // routers declaring themselves Designated Router are not eligible.
        let declared: Vec<_> = candidates
            .iter()
            .filter(|cand| {
                cand.bdr == Some(cand.addr) && cand.dr != Some(cand.addr)
            })
            .collect();
        let eligible: Vec<_> = if !declared.is_empty() {
            declared
        } else {
            candidates
                .iter()
                .filter(|cand| cand.dr != Some(cand.addr))
                .collect()
        };
        let bdr = eligible
            .into_iter()
            .max_by_key(|cand| (cand.priority, cand.addr))
            .map(|cand| cand.addr);

        // Calculate the Designated Router.
        let dr = candidates
            .iter()
            .filter(|cand| cand.dr == Some(cand.addr))
            .max_by_key(|cand| (cand.priority, cand.addr))
            .map(|cand| cand.addr)
            .or(bdr);

        (dr, bdr)
    }

    pub(crate) fn is_down(&self) -> bool {
        self.state.ism_state == State::Down
    }

    pub(crate) fn is_passive(&self) -> bool {
        self.config.passive
    }

    pub(crate) fn is_broadcast_or_nbma(&self) -> bool {
        matches!(
            self.config.if_type,
            InterfaceType::Broadcast | InterfaceType::NonBroadcast
        )
    }

    // Returns whether an adjacency should be established with the given
    // neighbor (RFC 2328, Section 10.4).
    pub(crate) fn need_adjacency(&self, nbr: &Neighbor) -> bool {
        match self.config.if_type {
            InterfaceType::PointToPoint
            | InterfaceType::PointToMultipoint
            | InterfaceType::Virtual => true,
            InterfaceType::Broadcast | InterfaceType::NonBroadcast => {
                let nbr_addr = Some(nbr.src);
                matches!(
                    self.state.ism_state,
                    State::Dr | State::Backup
                ) || self.state.dr == nbr_addr
                    || self.state.bdr == nbr_addr
            }
        }
    }

    // Find neighbor identified by its source address or Router ID, depending
    // on the interface type.
    pub(crate) fn get_neighbor<'a>(
        &self,
        src: Ipv4Addr,
        router_id: Ipv4Addr,
        neighbors: &'a mut Arena<Neighbor>,
    ) -> Option<(NeighborIndex, &'a mut Neighbor)> {
        match self.config.if_type {
            InterfaceType::Broadcast
            | InterfaceType::NonBroadcast
            | InterfaceType::PointToMultipoint => {
                self.state.neighbors.get_mut_by_src(neighbors, src)
            }
            InterfaceType::PointToPoint | InterfaceType::Virtual => {
                self.state.neighbors.get_mut_by_router_id(neighbors, router_id)
            }
        }
    }

    // Returns the TTL used for packets sent out this interface. Virtual
    // links cross a transit area and use a distinguished TTL.
    pub(crate) fn send_ttl(&self) -> u8 {
        if self.config.if_type == InterfaceType::Virtual {
            VIRTUAL_LINK_TTL
        } else {
            DEFAULT_TTL
        }
    }

    // Returns the destination used to send periodic Hello packets.
    pub(crate) fn hello_destination(&self) -> SendDestination {
        let addrs: SmallVec<[Ipv4Addr; 4]> = match self.config.if_type {
            InterfaceType::Broadcast | InterfaceType::PointToPoint => {
                smallvec![MulticastAddr::AllSpfRtrs.addr()]
            }
            InterfaceType::NonBroadcast
            | InterfaceType::PointToMultipoint => {
                // Hellos are sent as unicasts to each configured neighbor.
                self.config.static_nbrs.keys().copied().collect()
            }
            InterfaceType::Virtual => {
                self.config.vlink_peer_addr.into_iter().collect()
            }
        };
        SendDestination::new(self.config.ifindex, addrs, self.send_ttl())
    }

    pub(crate) fn delayed_ack_start_check(
        &mut self,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        if !self.state.ls_ack_list.is_empty()
            && self.state.tasks.ls_delayed_ack.is_none()
        {
            let task = tasks::delayed_ack_timer(self, area, instance);
            self.state.tasks.ls_delayed_ack = Some(task);
        }
    }

    // Enqueue packet for network transmission.
    pub(crate) fn send_packet(
        &self,
        instance: &InstanceUpView<'_>,
        msg: NetTxPacketMsg,
    ) {
        Debug::PacketTx(&msg.dst, &msg.packet).log();

        let _ = instance
            .tx
            .protocol_output
            .send(crate::tasks::messages::ProtocolOutputMsg::NetTxPacket(msg));
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        Debug::InterfaceDelete(&self.name).log();
    }
}

// ===== impl InterfaceCfg =====

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            ifindex: 0,
            if_type: InterfaceType::Broadcast,
            addr: None,
            mtu: 1500,
            priority: 1,
            hello_interval: 10,
            dead_interval: 40,
            retransmit_interval: 5,
            passive: false,
            auth: AuthCfg::default(),
            static_nbrs: Default::default(),
            transit_area_id: None,
            vlink_peer: None,
            vlink_peer_addr: None,
        }
    }
}

// ===== impl InterfaceType =====

impl std::fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceType::PointToPoint => write!(f, "point-to-point"),
            InterfaceType::Broadcast => write!(f, "broadcast"),
            InterfaceType::NonBroadcast => write!(f, "non-broadcast"),
            InterfaceType::PointToMultipoint => {
                write!(f, "point-to-multipoint")
            }
            InterfaceType::Virtual => write!(f, "virtual"),
        }
    }
}
