//! Dissemination strategies and forwarding identifiers
//!
//! The strategy of a scope or item decides where rendezvous is resolved:
//! locally on this node, or by the domain's Topology Authority. A node's
//! strategy is fixed at creation and never changes.

use std::fmt;

/// Per-node dissemination policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Strategy {
    /// All parties live on this node; rendezvous resolves to the internal
    /// link.
    NodeLocal = 0x00,
    /// Single-hop neighborhood; rendezvous resolves to the broadcast
    /// forwarding identifier.
    LinkLocal = 0x01,
    /// Domain-wide dissemination; matching is delegated to the Topology
    /// Authority.
    Domain = 0x02,
}

impl Strategy {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Strategy::NodeLocal),
            0x01 => Some(Strategy::LinkLocal),
            0x02 => Some(Strategy::Domain),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Can rendezvous for this strategy be decided on this node alone?
    #[inline]
    pub fn is_local(self) -> bool {
        matches!(self, Strategy::NodeLocal | Strategy::LinkLocal)
    }
}

/// Length of a forwarding identifier in bytes.
pub const FORWARDING_ID_LEN: usize = 32;

/// LIPSIN-style forwarding identifier handed to local publishers when a
/// match succeeds. The actual computation of multicast identifiers belongs
/// to the Topology Authority; the core only knows the two degenerate ones.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardingId(pub [u8; FORWARDING_ID_LEN]);

impl ForwardingId {
    /// Delivery over the node-internal link.
    pub const INTERNAL_LINK: ForwardingId = {
        let mut bytes = [0u8; FORWARDING_ID_LEN];
        bytes[0] = 0x80;
        ForwardingId(bytes)
    };

    /// Delivery to every single-hop neighbor.
    pub const BROADCAST: ForwardingId = ForwardingId([0xFF; FORWARDING_ID_LEN]);

    #[inline]
    pub fn new(bytes: [u8; FORWARDING_ID_LEN]) -> Self {
        ForwardingId(bytes)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; FORWARDING_ID_LEN] {
        self.0
    }
}

impl fmt::Debug for ForwardingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fid(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_roundtrip() {
        for strategy in [Strategy::NodeLocal, Strategy::LinkLocal, Strategy::Domain] {
            assert_eq!(Strategy::from_byte(strategy.to_byte()), Some(strategy));
        }
        assert_eq!(Strategy::from_byte(0x77), None);
    }

    #[test]
    fn test_strategy_locality() {
        assert!(Strategy::NodeLocal.is_local());
        assert!(Strategy::LinkLocal.is_local());
        assert!(!Strategy::Domain.is_local());
    }

    #[test]
    fn test_forwarding_id_constants_differ() {
        assert_ne!(ForwardingId::INTERNAL_LINK, ForwardingId::BROADCAST);
    }
}
