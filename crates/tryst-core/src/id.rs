//! Identity types for the rendezvous naming graph
//!
//! All naming is built from fixed-length opaque fragments. A full
//! identifier is an ordered sequence of fragments forming one path from a
//! root scope; a node reachable through several paths is known under
//! several full identifiers at once.

use std::fmt;

use bytes::BufMut;

use crate::{RvError, RvResult};

/// Length of one identifier fragment in bytes.
pub const FRAGMENT_LEN: usize = 8;

/// One atomic naming unit - a fixed-length opaque identifier segment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FragmentId(pub [u8; FRAGMENT_LEN]);

impl FragmentId {
    #[inline]
    pub fn new(bytes: [u8; FRAGMENT_LEN]) -> Self {
        FragmentId(bytes)
    }

    /// Build a fragment from a short name, right-padded with zero bytes.
    /// Names longer than one fragment are truncated.
    pub fn named(name: &str) -> Self {
        let mut bytes = [0u8; FRAGMENT_LEN];
        let raw = name.as_bytes();
        let len = raw.len().min(FRAGMENT_LEN);
        bytes[..len].copy_from_slice(&raw[..len]);
        FragmentId(bytes)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; FRAGMENT_LEN] {
        self.0
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; FRAGMENT_LEN]) -> Self {
        FragmentId(bytes)
    }
}

impl fmt::Debug for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frag(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Label of one overlay node, the same width as a fragment.
///
/// The rendezvous core never sees applications, only statistically unique
/// node labels; one of them is the local node itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeLabel(pub [u8; FRAGMENT_LEN]);

impl NodeLabel {
    #[inline]
    pub fn new(bytes: [u8; FRAGMENT_LEN]) -> Self {
        NodeLabel(bytes)
    }

    /// Build a label from a short name, right-padded with zero bytes.
    pub fn named(name: &str) -> Self {
        NodeLabel(FragmentId::named(name).0)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; FRAGMENT_LEN] {
        self.0
    }
}

impl fmt::Debug for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Full identifier - a path of fragments from a root.
///
/// The empty identifier is valid only where a prefix may be empty (root
/// operations); everywhere else it is malformed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FullId {
    fragments: Vec<FragmentId>,
}

impl FullId {
    /// The empty identifier (a root prefix).
    pub fn empty() -> Self {
        FullId {
            fragments: Vec::new(),
        }
    }

    /// A single-fragment identifier naming a root scope.
    pub fn root(fragment: FragmentId) -> Self {
        FullId {
            fragments: vec![fragment],
        }
    }

    pub fn from_fragments(fragments: Vec<FragmentId>) -> Self {
        FullId { fragments }
    }

    /// Extend this identifier by one fragment, yielding a child path.
    pub fn child(&self, fragment: FragmentId) -> Self {
        let mut fragments = Vec::with_capacity(self.fragments.len() + 1);
        fragments.extend_from_slice(&self.fragments);
        fragments.push(fragment);
        FullId { fragments }
    }

    /// The identifier with the last fragment removed; `None` when empty,
    /// the empty identifier for single-fragment (root) paths.
    pub fn parent(&self) -> Option<FullId> {
        if self.fragments.is_empty() {
            return None;
        }
        Some(FullId {
            fragments: self.fragments[..self.fragments.len() - 1].to_vec(),
        })
    }

    /// The last fragment of the path, the owning node's own fragment.
    pub fn last(&self) -> Option<FragmentId> {
        self.fragments.last().copied()
    }

    pub fn fragments(&self) -> &[FragmentId] {
        &self.fragments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Append the raw fragment bytes to a buffer.
    pub fn encode(&self, buf: &mut impl BufMut) {
        for fragment in &self.fragments {
            buf.put_slice(&fragment.0);
        }
    }

    /// Decode an identifier from raw bytes. The length must be a multiple
    /// of [`FRAGMENT_LEN`]; zero bytes decode to the empty identifier.
    pub fn decode(raw: &[u8]) -> RvResult<FullId> {
        if raw.len() % FRAGMENT_LEN != 0 {
            return Err(RvError::MalformedIdentifier(raw.len()));
        }
        let fragments = raw
            .chunks_exact(FRAGMENT_LEN)
            .map(|chunk| {
                let mut bytes = [0u8; FRAGMENT_LEN];
                bytes.copy_from_slice(chunk);
                FragmentId(bytes)
            })
            .collect();
        Ok(FullId { fragments })
    }

    /// Size of the raw encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        self.fragments.len() * FRAGMENT_LEN
    }
}

impl fmt::Debug for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl fmt::Display for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fragments.is_empty() {
            return write!(f, "/");
        }
        for fragment in &self.fragments {
            write!(f, "/{fragment}")?;
        }
        Ok(())
    }
}

/// Stable handle of one Scope in the graph arena.
///
/// Handles are never reused; a stale handle fails loudly on lookup
/// instead of resolving to an unrelated node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeRef(pub u64);

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope#{}", self.0)
    }
}

/// Stable handle of one InformationItem in the graph arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemRef(pub u64);

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_fragment_named_padding() {
        let fragment = FragmentId::named("A");
        assert_eq!(fragment.0[0], b'A');
        assert!(fragment.0[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_full_id_child_and_parent() {
        let a = FullId::root(FragmentId::named("A"));
        let ab = a.child(FragmentId::named("B"));

        assert_eq!(ab.len(), 2);
        assert_eq!(ab.last(), Some(FragmentId::named("B")));
        assert_eq!(ab.parent(), Some(a.clone()));
        assert_eq!(a.parent(), Some(FullId::empty()));
        assert_eq!(FullId::empty().parent(), None);
    }

    #[test]
    fn test_full_id_encode_decode_roundtrip() {
        let id = FullId::root(FragmentId::named("A")).child(FragmentId::named("B"));
        let mut buf = BytesMut::new();
        id.encode(&mut buf);

        assert_eq!(buf.len(), id.encoded_len());
        let decoded = FullId::decode(&buf).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_full_id_decode_rejects_partial_fragment() {
        let err = FullId::decode(&[0u8; FRAGMENT_LEN + 3]).unwrap_err();
        assert!(matches!(err, RvError::MalformedIdentifier(11)));
    }

    #[test]
    fn test_full_id_display() {
        let id = FullId::root(FragmentId::new([0xAA; FRAGMENT_LEN]));
        assert_eq!(format!("{id}"), "/aaaaaaaaaaaaaaaa");
        assert_eq!(format!("{}", FullId::empty()), "/");
    }
}
