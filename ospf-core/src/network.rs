//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use derive_new::new;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// OSPF IP protocol number.
pub const OSPF_IP_PROTO: i32 = 89;

// TTL used for packets sent to directly attached neighbors.
pub const DEFAULT_TTL: u8 = 1;

// TTL used for packets sent over virtual links, which cross a transit area.
pub const VIRTUAL_LINK_TTL: u8 = 32;

// Destination of an outgoing packet, handed to the transport layer.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct SendDestination {
    pub ifindex: u32,
    pub addrs: SmallVec<[Ipv4Addr; 4]>,
    pub ttl: u8,
}

// OSPF multicast groups (RFC 2328, Section 8.1).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MulticastAddr {
    AllSpfRtrs,
    AllDrRtrs,
}

// ===== impl MulticastAddr =====

impl MulticastAddr {
    pub const fn addr(&self) -> Ipv4Addr {
        match self {
            MulticastAddr::AllSpfRtrs => Ipv4Addr::new(224, 0, 0, 5),
            MulticastAddr::AllDrRtrs => Ipv4Addr::new(224, 0, 0, 6),
        }
    }
}

impl std::fmt::Display for MulticastAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.addr().fmt(f)
    }
}
