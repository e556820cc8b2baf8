//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ospf_utils::task::IntervalTask;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::collections::{
    Arena, AreaId, AreaIndex, Areas, InterfaceId, InterfaceIndex, NeighborId,
};
use crate::debug::{Debug, InstanceInactiveReason, InterfaceInactiveReason};
use crate::error::Error;
use crate::interface::{Interface, InterfaceCfg, ism};
use crate::lsdb::Lsdb;
use crate::neighbor::{Neighbor, nsm};
use crate::tasks;
use crate::tasks::messages::input::{
    DatabaseAgeMsg, DelayedAckMsg, IsmEventMsg, NetRxPacketMsg, NsmEventMsg,
    RxmtIntervalMsg,
};
use crate::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use crate::events;

// One OSPF router instance.
//
// All packet and timer processing for the instance funnels through
// `process_protocol_msg`, one message at a time. There is no concurrent
// dispatch: timers and the packet transport communicate with the instance
// exclusively through the input channels.
pub struct Instance {
    // Instance name.
    pub name: String,
    // Instance configuration data.
    pub config: InstanceCfg,
    // Instance state data.
    pub state: Option<InstanceState>,
    // Instance arenas.
    pub arenas: InstanceArenas,
    // Instance Tx channels.
    pub tx: InstanceChannelsTx,
}

#[derive(Clone, Debug)]
pub struct InstanceCfg {
    pub router_id: Option<Ipv4Addr>,
    pub enabled: bool,
}

#[derive(Debug)]
pub struct InstanceState {
    // Instance Router ID.
    pub router_id: Ipv4Addr,
    // LSDB of AS-scope LSAs.
    pub lsdb: Lsdb,
    // Statistics.
    pub discontinuity_time: DateTime<Utc>,
    // Tasks.
    pub tasks: InstanceTasks,
}

#[derive(Debug, Default)]
pub struct InstanceTasks {
    // Database aging sweep task.
    pub database_age: Option<IntervalTask>,
}

#[derive(Debug, Default)]
pub struct InstanceArenas {
    pub areas: Areas,
    pub interfaces: Arena<Interface>,
    pub neighbors: Arena<Neighbor>,
}

#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    pub protocol_input: ProtocolInputChannelsTx,
    pub protocol_output: UnboundedSender<ProtocolOutputMsg>,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Interface FSM event.
    pub ism_event: UnboundedSender<IsmEventMsg>,
    // Neighbor FSM event.
    pub nsm_event: UnboundedSender<NsmEventMsg>,
    // Packet Rx event.
    pub net_packet_rx: UnboundedSender<NetRxPacketMsg>,
    // Packet retransmission interval.
    pub rxmt_interval: UnboundedSender<RxmtIntervalMsg>,
    // Delayed Ack timeout.
    pub delayed_ack_timeout: UnboundedSender<DelayedAckMsg>,
    // Database aging sweep interval.
    pub database_age: UnboundedSender<DatabaseAgeMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Interface FSM event.
    pub ism_event: UnboundedReceiver<IsmEventMsg>,
    // Neighbor FSM event.
    pub nsm_event: UnboundedReceiver<NsmEventMsg>,
    // Packet Rx event.
    pub net_packet_rx: UnboundedReceiver<NetRxPacketMsg>,
    // Packet retransmission interval.
    pub rxmt_interval: UnboundedReceiver<RxmtIntervalMsg>,
    // Delayed Ack timeout.
    pub delayed_ack_timeout: UnboundedReceiver<DelayedAckMsg>,
    // Database aging sweep interval.
    pub database_age: UnboundedReceiver<DatabaseAgeMsg>,
}

// Operational view of an active instance.
pub struct InstanceUpView<'a> {
    pub name: &'a str,
    pub config: &'a InstanceCfg,
    pub state: &'a mut InstanceState,
    pub tx: &'a InstanceChannelsTx,
}

// ===== impl Instance =====

impl Instance {
    pub fn new(
        name: String,
    ) -> (
        Instance,
        ProtocolInputChannelsRx,
        UnboundedReceiver<ProtocolOutputMsg>,
    ) {
        Debug::InstanceCreate.log();

        let (protocol_input_tx, protocol_input_rx) = protocol_input_channels();
        let (protocol_outputp, protocol_outputc) = mpsc::unbounded_channel();

        let instance = Instance {
            name,
            config: InstanceCfg::default(),
            state: None,
            arenas: Default::default(),
            tx: InstanceChannelsTx {
                protocol_input: protocol_input_tx,
                protocol_output: protocol_outputp,
            },
        };

        (instance, protocol_input_rx, protocol_outputc)
    }

    // Checks if the instance needs to be started or stopped in response to
    // a configuration change.
    pub fn update(&mut self) {
        let router_id = self.config.router_id;

        match self.is_ready(router_id) {
            Ok(()) if !self.is_active() => {
                self.start(router_id.unwrap());
            }
            Err(reason) if self.is_active() => {
                self.stop(reason);
            }
            _ => (),
        }
    }

    fn start(&mut self, router_id: Ipv4Addr) {
        Debug::InstanceStart.log();

        // Store instance initial state.
        self.state = Some(InstanceState::new(router_id));

        let (mut instance, arenas) = self.as_up().unwrap();

        // Start the database aging sweep.
        let task = tasks::database_age_interval(&instance);
        instance.state.tasks.database_age = Some(task);

        // Try to start interfaces on all configured areas.
        for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
            let area = &arenas.areas[area_idx];
            for iface_idx in area.interfaces.indexes().collect::<Vec<_>>() {
                let iface = &mut arenas.interfaces[iface_idx];
                iface.fsm(
                    area,
                    &instance,
                    &mut arenas.neighbors,
                    ism::Event::InterfaceUp,
                );
            }
        }
    }

    fn stop(&mut self, reason: InstanceInactiveReason) {
        if !self.is_active() {
            return;
        }

        Debug::InstanceStop(reason).log();

        // Stop interfaces on all configured areas.
        let (instance, arenas) = self.as_up().unwrap();
        for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
            let area = &arenas.areas[area_idx];
            for iface_idx in area.interfaces.indexes().collect::<Vec<_>>() {
                let iface = &mut arenas.interfaces[iface_idx];
                iface.fsm(
                    area,
                    &instance,
                    &mut arenas.neighbors,
                    ism::Event::InterfaceDown(
                        InterfaceInactiveReason::InstanceDown,
                    ),
                );
            }
        }

        // Clear instance state.
        self.state = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    // Returns whether the instance is ready for OSPF operation.
    fn is_ready(
        &self,
        router_id: Option<Ipv4Addr>,
    ) -> Result<(), InstanceInactiveReason> {
        if !self.config.enabled || self.arenas.interfaces.is_empty() {
            return Err(InstanceInactiveReason::AdminDown);
        }

        if router_id.is_none() {
            return Err(InstanceInactiveReason::MissingRouterId);
        }

        Ok(())
    }

    // Adds a new area to the instance.
    pub fn add_area(&mut self, area_id: Ipv4Addr) -> AreaIndex {
        let (area_idx, _) = self.arenas.areas.insert(area_id);
        area_idx
    }

    // Adds a new interface to the given area.
    pub fn add_interface(
        &mut self,
        area_idx: AreaIndex,
        name: &str,
        config: InterfaceCfg,
    ) -> InterfaceIndex {
        let iface = Interface::new(name.to_owned(), config);
        let area = &mut self.arenas.areas[area_idx];
        let (iface_idx, _) =
            area.interfaces.insert(&mut self.arenas.interfaces, iface);
        iface_idx
    }

    pub fn as_up(
        &mut self,
    ) -> Option<(InstanceUpView<'_>, &mut InstanceArenas)> {
        if let Some(state) = &mut self.state {
            let instance = InstanceUpView {
                name: &self.name,
                config: &self.config,
                state,
                tx: &self.tx,
            };
            Some((instance, &mut self.arenas))
        } else {
            None
        }
    }

    // Processes one protocol input message to completion.
    //
    // This is the single entry point for all inbound events (packets and
    // timer expiries); events are never processed concurrently.
    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        // Ignore event if the instance isn't active.
        if let Some((mut instance, arenas)) = self.as_up()
            && let Err(error) = process_protocol_msg(&mut instance, arenas, msg)
        {
            error.log();
        }
    }

    // Runs the instance event loop.
    pub async fn run(&mut self, mut rx: ProtocolInputChannelsRx) {
        while let Some(msg) = rx.recv().await {
            self.process_protocol_msg(msg);
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").field("name", &self.name).finish()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        Debug::InstanceDelete.log();
    }
}

// ===== impl InstanceCfg =====

impl Default for InstanceCfg {
    fn default() -> InstanceCfg {
        InstanceCfg {
            router_id: None,
            enabled: true,
        }
    }
}

// ===== impl InstanceState =====

impl InstanceState {
    fn new(router_id: Ipv4Addr) -> InstanceState {
        InstanceState {
            router_id,
            lsdb: Default::default(),
            discontinuity_time: Utc::now(),
            tasks: Default::default(),
        }
    }
}

// ===== impl ProtocolInputChannelsTx =====

impl ProtocolInputChannelsTx {
    pub(crate) fn ism_event(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        event: ism::Event,
    ) {
        let _ = self.ism_event.send(IsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            event,
        });
    }

    pub(crate) fn nsm_event(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        event: nsm::Event,
    ) {
        let _ = self.nsm_event.send(NsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            nbr_key: nbr_id.into(),
            event,
        });
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    // Receives the next protocol input message.
    //
    // FSM events take precedence over data packets, matching the dispatch
    // order of the event queue they used to share.
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            biased;
            msg = self.ism_event.recv() => {
                msg.map(ProtocolInputMsg::IsmEvent)
            }
            msg = self.nsm_event.recv() => {
                msg.map(ProtocolInputMsg::NsmEvent)
            }
            msg = self.net_packet_rx.recv() => {
                msg.map(ProtocolInputMsg::NetRxPacket)
            }
            msg = self.rxmt_interval.recv() => {
                msg.map(ProtocolInputMsg::RxmtInterval)
            }
            msg = self.delayed_ack_timeout.recv() => {
                msg.map(ProtocolInputMsg::DelayedAck)
            }
            msg = self.database_age.recv() => {
                msg.map(ProtocolInputMsg::DatabaseAge)
            }
        }
    }

    // Non-blocking variant of `recv`, used to drain internally generated
    // events in-between test steps.
    pub fn try_recv(&mut self) -> Option<ProtocolInputMsg> {
        if let Ok(msg) = self.ism_event.try_recv() {
            return Some(ProtocolInputMsg::IsmEvent(msg));
        }
        if let Ok(msg) = self.nsm_event.try_recv() {
            return Some(ProtocolInputMsg::NsmEvent(msg));
        }
        if let Ok(msg) = self.net_packet_rx.try_recv() {
            return Some(ProtocolInputMsg::NetRxPacket(msg));
        }
        if let Ok(msg) = self.rxmt_interval.try_recv() {
            return Some(ProtocolInputMsg::RxmtInterval(msg));
        }
        if let Ok(msg) = self.delayed_ack_timeout.try_recv() {
            return Some(ProtocolInputMsg::DelayedAck(msg));
        }
        if let Ok(msg) = self.database_age.try_recv() {
            return Some(ProtocolInputMsg::DatabaseAge(msg));
        }
        None
    }
}

// ===== helper functions =====

fn protocol_input_channels()
-> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
    let (ism_eventp, ism_eventc) = mpsc::unbounded_channel();
    let (nsm_eventp, nsm_eventc) = mpsc::unbounded_channel();
    let (net_packet_rxp, net_packet_rxc) = mpsc::unbounded_channel();
    let (rxmt_intervalp, rxmt_intervalc) = mpsc::unbounded_channel();
    let (delayed_ack_timeoutp, delayed_ack_timeoutc) =
        mpsc::unbounded_channel();
    let (database_agep, database_agec) = mpsc::unbounded_channel();

    let tx = ProtocolInputChannelsTx {
        ism_event: ism_eventp,
        nsm_event: nsm_eventp,
        net_packet_rx: net_packet_rxp,
        rxmt_interval: rxmt_intervalp,
        delayed_ack_timeout: delayed_ack_timeoutp,
        database_age: database_agep,
    };
    let rx = ProtocolInputChannelsRx {
        ism_event: ism_eventc,
        nsm_event: nsm_eventc,
        net_packet_rx: net_packet_rxc,
        rxmt_interval: rxmt_intervalc,
        delayed_ack_timeout: delayed_ack_timeoutc,
        database_age: database_agec,
    };

    (tx, rx)
}

fn process_protocol_msg(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    msg: ProtocolInputMsg,
) -> Result<(), Error> {
    match msg {
        // Interface FSM event.
        ProtocolInputMsg::IsmEvent(msg) => events::process_ism_event(
            instance,
            arenas,
            msg.area_key,
            msg.iface_key,
            msg.event,
        )?,
        // Neighbor FSM event.
        ProtocolInputMsg::NsmEvent(msg) => events::process_nsm_event(
            instance,
            arenas,
            msg.area_key,
            msg.iface_key,
            msg.nbr_key,
            msg.event,
        )?,
        // Received network packet.
        ProtocolInputMsg::NetRxPacket(msg) => events::process_packet(
            instance,
            arenas,
            msg.ifindex,
            msg.src,
            msg.dst,
            msg.packet,
        )?,
        // Packet retransmission.
        ProtocolInputMsg::RxmtInterval(msg) => events::process_packet_rxmt(
            instance,
            arenas,
            msg.area_key,
            msg.iface_key,
            msg.nbr_key,
            msg.packet_type,
        )?,
        // Delayed Ack timeout.
        ProtocolInputMsg::DelayedAck(msg) => {
            events::process_delayed_ack_timeout(
                instance,
                arenas,
                msg.area_key,
                msg.iface_key,
            )?
        }
        // Database aging sweep.
        ProtocolInputMsg::DatabaseAge(_) => {
            events::process_database_age(instance, arenas)?
        }
    }

    Ok(())
}
