//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod auth;
pub mod lsa;

use std::net::Ipv4Addr;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::packet::auth::PacketAuth;
use crate::packet::lsa::{LsaHdr, LsaKey};

// OSPF protocol version handled by this implementation.
pub const OSPF_VERSION: u8 = 2;

// Database Description flags.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct DbDescFlags: u8 {
        const MS = 0x01;
        const M = 0x02;
        const I = 0x04;
    }
}

// OSPF Packet Type.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-3
#[derive(Clone, Copy, Debug, Eq, Hash, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    Hello = 0x01,
    DbDesc = 0x02,
    LsRequest = 0x03,
    LsUpdate = 0x04,
    LsAck = 0x05,
}

// OSPF packet header.
//
// Produced by the external codec; only the fields consumed by the dispatch
// and adjacency logic are modeled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PacketHdr {
    pub version: u8,
    pub pkt_type: PacketType,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub auth: PacketAuth,
}

// OSPF packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    Hello(HelloPacket),
    DbDesc(DbDescPacket),
    LsRequest(LsRequestPacket),
    LsUpdate(LsUpdatePacket),
    LsAck(LsAckPacket),
}

// OSPF Hello packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct HelloPacket {
    pub hdr: PacketHdr,
    pub network_mask: Ipv4Addr,
    pub hello_interval: u16,
    pub dead_interval: u32,
    pub priority: u8,
    pub dr: Option<Ipv4Addr>,
    pub bdr: Option<Ipv4Addr>,
    pub neighbors: Vec<Ipv4Addr>,
}

// OSPF Database Description packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DbDescPacket {
    pub hdr: PacketHdr,
    pub mtu: u16,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub lsa_hdrs: Vec<LsaHdr>,
}

// OSPF Link State Request packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsRequestPacket {
    pub hdr: PacketHdr,
    pub entries: Vec<LsaKey>,
}

// OSPF Link State Update packet.
//
// LSA bodies stay with the codec; the headers are all the adjacency logic
// needs to retire requests and acknowledge receipt.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsUpdatePacket {
    pub hdr: PacketHdr,
    pub lsas: Vec<LsaHdr>,
}

// OSPF Link State Acknowledgment packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsAckPacket {
    pub hdr: PacketHdr,
    pub lsa_hdrs: Vec<LsaHdr>,
}

// ===== impl PacketType =====

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketType::Hello => write!(f, "Hello"),
            PacketType::DbDesc => write!(f, "Database Description"),
            PacketType::LsRequest => write!(f, "Link State Request"),
            PacketType::LsUpdate => write!(f, "Link State Update"),
            PacketType::LsAck => write!(f, "Link State Ack"),
        }
    }
}

// ===== impl Packet =====

impl Packet {
    pub fn hdr(&self) -> &PacketHdr {
        match self {
            Packet::Hello(pkt) => &pkt.hdr,
            Packet::DbDesc(pkt) => &pkt.hdr,
            Packet::LsRequest(pkt) => &pkt.hdr,
            Packet::LsUpdate(pkt) => &pkt.hdr,
            Packet::LsAck(pkt) => &pkt.hdr,
        }
    }

    pub fn pkt_type(&self) -> PacketType {
        self.hdr().pkt_type
    }
}

// ===== impl PacketHdr =====

impl PacketHdr {
    // Encoded packet header length.
    pub const LENGTH: u16 = 24;

    pub fn new(pkt_type: PacketType, router_id: Ipv4Addr, area_id: Ipv4Addr)
    -> PacketHdr {
        PacketHdr {
            version: OSPF_VERSION,
            pkt_type,
            router_id,
            area_id,
            auth: PacketAuth::Null,
        }
    }
}

// ===== impl DbDescPacket =====

impl DbDescPacket {
    // Encoded length, excluding the packet header and LSA headers.
    pub const BASE_LENGTH: u16 = 8;
}

// ===== impl LsRequestPacket =====

impl LsRequestPacket {
    // Encoded length of a single request entry.
    pub const ENTRY_LENGTH: u16 = 12;
}
