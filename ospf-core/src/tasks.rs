//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use ospf_utils::task::{IntervalTask, TimeoutTask};

use crate::area::Area;
use crate::instance::InstanceUpView;
use crate::interface::{Interface, ism};
use crate::lsdb;
use crate::neighbor::{Neighbor, nsm};

//
// OSPF tasks diagram:
//                                    +--------------+
//                     net_rx (Nx) -> |              | -> (Nx) net_tx
//                                    |              |
//             hello_interval (Nx) -> |              |
//             ism_wait_timer (Nx) -> |              |
//                                    |              |
//       nsm_inactivity_timer (Nx) -> |   instance   |
//         nbma_poll_interval (Nx) -> |              |
//       packet_rxmt_interval (Nx) -> |              |
//          delayed_ack_timer (Nx) -> |              |
//                                    |              |
//      database_age_interval (1x) -> |              |
//                                    +--------------+
//

// OSPF inter-task message types.
pub mod messages {
    use std::net::Ipv4Addr;

    use serde::{Deserialize, Serialize};

    use crate::collections::{AreaKey, InterfaceKey, NeighborKey};
    use crate::interface::ism;
    use crate::neighbor::{RxmtPacketType, nsm};
    use crate::network::SendDestination;
    use crate::packet::Packet;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;
    pub type ProtocolOutputMsg = output::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use super::*;

        #[derive(Debug)]
        #[derive(Deserialize, Serialize)]
        pub enum ProtocolMsg {
            IsmEvent(IsmEventMsg),
            NsmEvent(NsmEventMsg),
            NetRxPacket(NetRxPacketMsg),
            RxmtInterval(RxmtIntervalMsg),
            DelayedAck(DelayedAckMsg),
            DatabaseAge(DatabaseAgeMsg),
        }

        #[derive(Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct IsmEventMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub event: ism::Event,
        }

        #[derive(Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct NsmEventMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub nbr_key: NeighborKey,
            pub event: nsm::Event,
        }

        // Decoded packet handed over by the transport layer, tagged with
        // the system ifindex it arrived on.
        #[derive(Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct NetRxPacketMsg {
            pub ifindex: u32,
            pub src: Ipv4Addr,
            pub dst: Ipv4Addr,
            pub packet: Packet,
        }

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct RxmtIntervalMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub nbr_key: NeighborKey,
            pub packet_type: RxmtPacketType,
        }

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct DelayedAckMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
        }

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct DatabaseAgeMsg {}
    }

    // Output messages (main task -> child task).
    pub mod output {
        use super::*;

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub enum ProtocolMsg {
            NetTxPacket(NetTxPacketMsg),
        }

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct NetTxPacketMsg {
            pub packet: Packet,
            pub dst: SendDestination,
        }
    }
}

// ===== OSPF tasks =====

// Send periodic OSPF Hello messages.
pub(crate) fn hello_interval(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> IntervalTask {
    let area_id = area.id;
    let iface_id = iface.id;
    let ism_eventp = instance.tx.protocol_input.ism_event.clone();

    IntervalTask::new(
        Duration::from_secs(iface.config.hello_interval.into()),
        true,
        move || {
            let ism_eventp = ism_eventp.clone();

            async move {
                let msg = messages::input::IsmEventMsg {
                    area_key: area_id.into(),
                    iface_key: iface_id.into(),
                    event: ism::Event::HelloTimer,
                };
                let _ = ism_eventp.send(msg);
            }
        },
    )
}

// Interface wait timer task.
pub(crate) fn ism_wait_timer(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> TimeoutTask {
    let timeout = Duration::from_secs(iface.config.dead_interval.into());
    let area_id = area.id;
    let iface_id = iface.id;
    let ism_eventp = instance.tx.protocol_input.ism_event.clone();

    TimeoutTask::new(timeout, move || async move {
        let msg = messages::input::IsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            event: ism::Event::WaitTimer,
        };
        let _ = ism_eventp.send(msg);
    })
}

// Neighbor inactivity timer.
pub(crate) fn nsm_inactivity_timer(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> TimeoutTask {
    let timeout = Duration::from_secs(iface.config.dead_interval.into());
    let area_id = area.id;
    let iface_id = iface.id;
    let nbr_id = nbr.id;
    let nsm_eventp = instance.tx.protocol_input.nsm_event.clone();

    TimeoutTask::new(timeout, move || async move {
        let msg = messages::input::NsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            nbr_key: nbr_id.into(),
            event: nsm::Event::InactivityTimer,
        };
        let _ = nsm_eventp.send(msg);
    })
}

// Send periodic Hellos to a dead NBMA neighbor at the reduced rate
// PollInterval.
pub(crate) fn nbma_poll_interval(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    poll_interval: u16,
) -> IntervalTask {
    let area_id = area.id;
    let iface_id = iface.id;
    let nbr_id = nbr.id;
    let nsm_eventp = instance.tx.protocol_input.nsm_event.clone();

    IntervalTask::new(
        Duration::from_secs(poll_interval.into()),
        false,
        move || {
            let nsm_eventp = nsm_eventp.clone();

            async move {
                let msg = messages::input::NsmEventMsg {
                    area_key: area_id.into(),
                    iface_key: iface_id.into(),
                    nbr_key: nbr_id.into(),
                    event: nsm::Event::PollTimer,
                };
                let _ = nsm_eventp.send(msg);
            }
        },
    )
}

// Send periodic packet retransmissions.
pub(crate) fn packet_rxmt_interval(
    msg: messages::input::RxmtIntervalMsg,
    instance: &InstanceUpView<'_>,
    interval: u16,
) -> IntervalTask {
    let rxmt_intervalp = instance.tx.protocol_input.rxmt_interval.clone();

    IntervalTask::new(
        Duration::from_secs(interval.into()),
        false,
        move || {
            let rxmt_intervalp = rxmt_intervalp.clone();
            let msg = msg.clone();

            async move {
                let _ = rxmt_intervalp.send(msg);
            }
        },
    )
}

// Interface delayed Ack timer task.
pub(crate) fn delayed_ack_timer(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> TimeoutTask {
    let area_id = area.id;
    let iface_id = iface.id;
    let delayed_ack_timeoutp =
        instance.tx.protocol_input.delayed_ack_timeout.clone();

    // RFC 2328 - Section 13.5:
    // "The fixed interval between a router's delayed transmissions must be
    // short (less than RxmtInterval) or needless retransmissions will ensue".
    let timeout = Duration::from_secs(1);
    TimeoutTask::new(timeout, move || async move {
        let msg = messages::input::DelayedAckMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
        };
        let _ = delayed_ack_timeoutp.send(msg);
    })
}

// Database aging sweep interval task.
pub(crate) fn database_age_interval(
    instance: &InstanceUpView<'_>,
) -> IntervalTask {
    let database_agep = instance.tx.protocol_input.database_age.clone();

    IntervalTask::new(
        Duration::from_secs(lsdb::AGE_SWEEP_INTERVAL.into()),
        false,
        move || {
            let database_agep = database_agep.clone();

            async move {
                let _ = database_agep.send(messages::input::DatabaseAgeMsg {});
            }
        },
    )
}
