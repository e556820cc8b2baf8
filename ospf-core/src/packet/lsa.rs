//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::lsdb::{LSA_MAX_AGE, LSA_MAX_AGE_DIFF};

// OSPFv2 LSA types.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, Ord, PartialEq)]
#[derive(PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum LsaType {
    Router = 1,
    Network = 2,
    SummaryNetwork = 3,
    SummaryRouter = 4,
    AsExternal = 5,
}

// LSA identification key (RFC 2328, Section 12.1).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaKey {
    pub lsa_type: LsaType,
    pub adv_rtr: Ipv4Addr,
    pub lsa_id: Ipv4Addr,
}

// LSA header.
//
// The LSA body is opaque to the adjacency engine and stays with the external
// codec; headers alone drive database summaries, request lists and
// acknowledgments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaHdr {
    pub age: u16,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
}

// Scope of an LSA type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LsaScope {
    Area,
    As,
}

// ===== impl LsaType =====

impl LsaType {
    pub(crate) fn scope(&self) -> LsaScope {
        match self {
            LsaType::Router
            | LsaType::Network
            | LsaType::SummaryNetwork
            | LsaType::SummaryRouter => LsaScope::Area,
            LsaType::AsExternal => LsaScope::As,
        }
    }
}

impl std::fmt::Display for LsaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LsaType::Router => write!(f, "Router"),
            LsaType::Network => write!(f, "Network"),
            LsaType::SummaryNetwork => write!(f, "Summary-Network"),
            LsaType::SummaryRouter => write!(f, "Summary-Router"),
            LsaType::AsExternal => write!(f, "AS-External"),
        }
    }
}

// ===== impl LsaHdr =====

impl LsaHdr {
    // Encoded LSA header length.
    pub const LENGTH: u16 = 20;

    pub fn key(&self) -> LsaKey {
        LsaKey {
            lsa_type: self.lsa_type,
            adv_rtr: self.adv_rtr,
            lsa_id: self.lsa_id,
        }
    }

    pub fn is_maxage(&self) -> bool {
        self.age >= LSA_MAX_AGE
    }
}

// ===== global functions =====

// Compares which LSA instance is more recent (RFC 2328, Section 13.1).
//
// The LS checksum tie-breaker is skipped as checksumming belongs to the
// external codec.
pub fn lsa_compare(a: &LsaHdr, b: &LsaHdr) -> Ordering {
    let cmp = a.seq_no.cmp(&b.seq_no);
    if cmp != Ordering::Equal {
        return cmp;
    }

    if a.is_maxage() && !b.is_maxage() {
        return Ordering::Greater;
    }
    if !a.is_maxage() && b.is_maxage() {
        return Ordering::Less;
    }

    let age_diff = a.age.abs_diff(b.age);
    if age_diff > LSA_MAX_AGE_DIFF {
        // The younger LSA is considered more recent.
        return b.age.cmp(&a.age);
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    fn hdr(age: u16, seq_no: u32) -> LsaHdr {
        LsaHdr {
            age,
            lsa_type: LsaType::Router,
            lsa_id: Ipv4Addr::new(1, 1, 1, 1),
            adv_rtr: Ipv4Addr::new(1, 1, 1, 1),
            seq_no,
        }
    }

    #[test]
    fn lsa_compare_seq_no() {
        assert_eq!(
            lsa_compare(&hdr(0, 0x80000002), &hdr(0, 0x80000001)),
            Ordering::Greater
        );
        assert_eq!(
            lsa_compare(&hdr(900, 0x80000001), &hdr(0, 0x80000001)),
            Ordering::Equal
        );
    }

    #[test]
    fn lsa_compare_age() {
        // A MaxAge instance is always considered more recent.
        assert_eq!(
            lsa_compare(&hdr(3600, 0x80000001), &hdr(10, 0x80000001)),
            Ordering::Greater
        );
        // Ages differing by more than MaxAgeDiff favor the younger instance.
        assert_eq!(
            lsa_compare(&hdr(1000, 0x80000001), &hdr(10, 0x80000001)),
            Ordering::Less
        );
    }
}
