//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use crate::collections::{Arena, AreaId, InterfaceIndex, Interfaces};
use crate::interface::{Interface, InterfaceType};
use crate::lsdb::Lsdb;

// OSPF area.
#[derive(Debug)]
pub struct Area {
    pub id: AreaId,
    pub area_id: Ipv4Addr,
    // Interfaces attached to this area.
    pub interfaces: Interfaces,
    // Area state data.
    pub state: AreaState,
}

#[derive(Debug, Default)]
pub struct AreaState {
    // LSDB of area-scope LSAs.
    pub lsdb: Lsdb,
}

// ===== impl Area =====

impl Area {
    pub(crate) fn new(id: AreaId, area_id: Ipv4Addr) -> Area {
        Area {
            id,
            area_id,
            interfaces: Default::default(),
            state: Default::default(),
        }
    }

    pub(crate) fn is_backbone(&self) -> bool {
        self.area_id.is_unspecified()
    }

    // Searches this area's virtual links for one whose configured remote
    // endpoint is the given Router ID.
    pub fn find_virtual_link<'a>(
        &self,
        router_id: Ipv4Addr,
        interfaces: &'a Arena<Interface>,
    ) -> Option<(InterfaceIndex, &'a Interface)> {
        self.interfaces
            .indexes()
            .map(|iface_idx| (iface_idx, &interfaces[iface_idx]))
            .find(|(_, iface)| {
                iface.config.if_type == InterfaceType::Virtual
                    && iface.config.vlink_peer == Some(router_id)
            })
    }
}
