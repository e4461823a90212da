//! Inbound pub/sub requests and their outcome codes

use crate::{FullId, NodeLabel, Strategy};

/// The eight pub/sub request kinds a node may issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestKind {
    PublishScope = 0x01,
    PublishInfo = 0x02,
    UnpublishScope = 0x03,
    UnpublishInfo = 0x04,
    SubscribeScope = 0x05,
    SubscribeInfo = 0x06,
    UnsubscribeScope = 0x07,
    UnsubscribeInfo = 0x08,
}

impl RequestKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(RequestKind::PublishScope),
            0x02 => Some(RequestKind::PublishInfo),
            0x03 => Some(RequestKind::UnpublishScope),
            0x04 => Some(RequestKind::UnpublishInfo),
            0x05 => Some(RequestKind::SubscribeScope),
            0x06 => Some(RequestKind::SubscribeInfo),
            0x07 => Some(RequestKind::UnsubscribeScope),
            0x08 => Some(RequestKind::UnsubscribeInfo),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// One decoded pub/sub request.
///
/// `id` names the target relative to `prefix`; for republish forms `id`
/// is the full identifier of an already existing node whose last fragment
/// is attached under `prefix`.
#[derive(Clone, Debug)]
pub struct RvRequest {
    /// Label of the node that issued the request (possibly the local one).
    pub source: NodeLabel,
    pub kind: RequestKind,
    pub id: FullId,
    pub prefix: FullId,
    pub strategy: Strategy,
}

impl RvRequest {
    pub fn new(
        source: NodeLabel,
        kind: RequestKind,
        id: FullId,
        prefix: FullId,
        strategy: Strategy,
    ) -> Self {
        RvRequest {
            source,
            kind,
            id,
            prefix,
            strategy,
        }
    }
}

/// Outcome of one lifecycle operation.
///
/// Every rejection here is an ordinary, expected result of independent
/// requests racing from different nodes - never a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RvStatus {
    Success = 0x00,
    /// The prefix does not name an existing scope.
    ScopeNotFound = 0x01,
    /// The full identifier already names a scope.
    IdExistsAsScope = 0x02,
    /// The full identifier already names an information item.
    IdExistsAsItem = 0x03,
    /// The requested strategy differs from the stored one.
    StrategyMismatch = 0x04,
    /// Unpublish/unsubscribe/republish of a node that does not exist.
    TargetNotFound = 0x05,
    /// Identifier shape not valid for the request kind.
    MalformedIdentifier = 0x06,
}

impl RvStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(RvStatus::Success),
            0x01 => Some(RvStatus::ScopeNotFound),
            0x02 => Some(RvStatus::IdExistsAsScope),
            0x03 => Some(RvStatus::IdExistsAsItem),
            0x04 => Some(RvStatus::StrategyMismatch),
            0x05 => Some(RvStatus::TargetNotFound),
            0x06 => Some(RvStatus::MalformedIdentifier),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == RvStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_roundtrip() {
        for b in 0x01..=0x08 {
            let kind = RequestKind::from_byte(b).unwrap();
            assert_eq!(kind.to_byte(), b);
        }
        assert_eq!(RequestKind::from_byte(0x00), None);
        assert_eq!(RequestKind::from_byte(0x09), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for b in 0x00..=0x06 {
            let status = RvStatus::from_byte(b).unwrap();
            assert_eq!(status.to_byte(), b);
        }
        assert!(RvStatus::Success.is_success());
        assert!(!RvStatus::TargetNotFound.is_success());
    }
}
