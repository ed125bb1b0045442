// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Local interface discovery (§6 collaborator contract): yields the
//! `(name, address)` pairs a client may bind to, excluding loopback. Full OS
//! enumeration is out of scope; the concrete implementation here returns the
//! single address the client was configured with, but still documents and
//! enforces the loopback-exclusion rule the original honors (§2b).

use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    pub name: &'static str,
    pub address: IpAddr,
}

pub trait InterfaceSource {
    fn interfaces(&self) -> Vec<Interface>;
}

/// Returns a single, statically-configured interface. Rejects loopback
/// addresses at construction, matching the original's exclusion rule even
/// though there is only one candidate to filter.
pub struct StaticInterfaceSource {
    interface: Interface,
}

impl StaticInterfaceSource {
    pub fn new(address: IpAddr) -> Result<Self, &'static str> {
        if address.is_loopback() {
            return Err("loopback addresses are excluded from interface discovery");
        }
        Ok(Self {
            interface: Interface { name: "default", address },
        })
    }
}

impl InterfaceSource for StaticInterfaceSource {
    fn interfaces(&self) -> Vec<Interface> {
        vec![self.interface]
    }
}
