//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::packet::lsa::{LsaHdr, LsaKey, lsa_compare};

// Architectural constants (RFC 2328, Appendix B).
pub const LSA_MAX_AGE: u16 = 3600;
pub const LSA_MAX_AGE_DIFF: u16 = 900;

// Interval between database aging sweeps, in seconds.
pub const AGE_SWEEP_INTERVAL: u16 = 1;

// Link state database.
//
// The adjacency engine only needs LSA headers: database summaries sent
// during the exchange, freshness comparisons against request lists, and
// answers to Link State Requests. Bodies, flooding and origination stay
// with the surrounding system.
#[derive(Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct Lsdb {
    tree: BTreeMap<LsaKey, LsaHdr>,
}

// ===== impl Lsdb =====

impl Lsdb {
    // Installs the given LSA, unless the database copy is more recent.
    pub fn install(&mut self, hdr: LsaHdr) {
        match self.tree.entry(hdr.key()) {
            std::collections::btree_map::Entry::Occupied(mut o) => {
                if lsa_compare(o.get(), &hdr) == Ordering::Less {
                    o.insert(hdr);
                }
            }
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(hdr);
            }
        }
    }

    pub fn get(&self, key: &LsaKey) -> Option<&LsaHdr> {
        self.tree.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LsaHdr> {
        self.tree.values()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    // Ages all LSAs by the given number of seconds, expiring the ones that
    // reach MaxAge. Returns the number of expired LSAs.
    pub(crate) fn age(&mut self, elapsed: u16) -> usize {
        let before = self.tree.len();

        for hdr in self.tree.values_mut() {
            hdr.age = hdr.age.saturating_add(elapsed).min(LSA_MAX_AGE);
        }
        self.tree.retain(|_, hdr| !hdr.is_maxage());

        before - self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::packet::lsa::LsaType;

    fn hdr(lsa_id: u8, age: u16, seq_no: u32) -> LsaHdr {
        LsaHdr {
            age,
            lsa_type: LsaType::Router,
            lsa_id: Ipv4Addr::new(10, 0, 0, lsa_id),
            adv_rtr: Ipv4Addr::new(10, 0, 0, lsa_id),
            seq_no,
        }
    }

    #[test]
    fn install_keeps_most_recent() {
        let mut lsdb = Lsdb::default();

        lsdb.install(hdr(1, 0, 0x80000002));
        lsdb.install(hdr(1, 0, 0x80000001));
        assert_eq!(lsdb.get(&hdr(1, 0, 0).key()).unwrap().seq_no, 0x80000002);

        lsdb.install(hdr(1, 0, 0x80000003));
        assert_eq!(lsdb.get(&hdr(1, 0, 0).key()).unwrap().seq_no, 0x80000003);
    }

    #[test]
    fn age_expires_maxage_lsas() {
        let mut lsdb = Lsdb::default();

        lsdb.install(hdr(1, 100, 0x80000001));
        lsdb.install(hdr(2, LSA_MAX_AGE - 1, 0x80000001));

        assert_eq!(lsdb.age(1), 1);
        assert_eq!(lsdb.len(), 1);
        assert_eq!(lsdb.get(&hdr(1, 0, 0).key()).unwrap().age, 101);
    }
}
