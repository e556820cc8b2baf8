//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

use crate::packet::PacketHdr;

// Authentication data carried in the packet header (RFC 2328, Appendix D).
//
// Cryptographic authentication is validated by the external codec before the
// packet reaches the adjacency engine; only the null and simple-password
// schemes are checked here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketAuth {
    Null,
    Simple([u8; 8]),
}

// Per-interface authentication configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AuthCfg {
    #[default]
    Null,
    Simple([u8; 8]),
}

// ===== global functions =====

// Validates the authentication of a received packet against the receiving
// interface's configuration. Both the authentication type and the key must
// match.
pub(crate) fn authenticate(hdr: &PacketHdr, cfg: &AuthCfg) -> bool {
    match (cfg, &hdr.auth) {
        (AuthCfg::Null, PacketAuth::Null) => true,
        (AuthCfg::Simple(key), PacketAuth::Simple(rcvd)) => key == rcvd,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketType, OSPF_VERSION};

    fn hdr_with_auth(auth: PacketAuth) -> PacketHdr {
        PacketHdr {
            version: OSPF_VERSION,
            pkt_type: PacketType::Hello,
            router_id: std::net::Ipv4Addr::new(1, 1, 1, 1),
            area_id: std::net::Ipv4Addr::new(0, 0, 0, 0),
            auth,
        }
    }

    #[test]
    fn auth_type_and_key_must_match() {
        let key = *b"beefcafe";
        assert!(authenticate(&hdr_with_auth(PacketAuth::Null), &AuthCfg::Null));
        assert!(authenticate(
            &hdr_with_auth(PacketAuth::Simple(key)),
            &AuthCfg::Simple(key)
        ));
        assert!(!authenticate(
            &hdr_with_auth(PacketAuth::Null),
            &AuthCfg::Simple(key)
        ));
        assert!(!authenticate(
            &hdr_with_auth(PacketAuth::Simple(*b"deadbeef")),
            &AuthCfg::Simple(key)
        ));
    }
}
