//! Typed UUID identifiers.
//!
//! Every identifier is an [`Id`] tagged with the kind of record it points at,
//! so an event id can never be passed where a product id is expected. The
//! aliases [`EventId`], [`ProductId`] and [`SupplyId`] are what the rest of the
//! workspace names.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::DomainError;

/// Marks the record kind an [`Id`] refers to.
pub trait IdKind {
    /// Used in parse errors, e.g. `event id`.
    const LABEL: &'static str;
}

/// Record kinds. Uninhabited; they only exist as type tags.
pub mod kind {
    use super::IdKind;

    #[derive(Debug)]
    pub enum Event {}

    #[derive(Debug)]
    pub enum Product {}

    #[derive(Debug)]
    pub enum Supply {}

    impl IdKind for Event {
        const LABEL: &'static str = "event id";
    }

    impl IdKind for Product {
        const LABEL: &'static str = "product id";
    }

    impl IdKind for Supply {
        const LABEL: &'static str = "supply id";
    }
}

/// An event: the scope every inventory row belongs to.
pub type EventId = Id<kind::Event>;
/// A catalog product.
pub type ProductId = Id<kind::Product>;
/// A catalog supply, used as a recipe ingredient.
pub type SupplyId = Id<kind::Supply>;

/// UUID tagged with the kind of record it identifies.
///
/// Serializes as the bare UUID string.
pub struct Id<K> {
    uuid: Uuid,
    kind: PhantomData<fn() -> K>,
}

impl<K> Id<K> {
    /// Fresh time-ordered (v7) identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            kind: PhantomData,
        }
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.uuid
    }
}

impl<K: IdKind> Id<K> {
    /// Parse the textual UUID form; failures name the id kind.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(raw.trim())
            .map(Self::from_uuid)
            .map_err(|e| DomainError::invalid_id(format!("{} {raw:?}: {e}", K::LABEL)))
    }
}

// Manual impls: derives would put bounds on the uninhabited `K`.

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<K> Default for Id<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::LABEL, self.uuid)
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.uuid, f)
    }
}

impl<K: IdKind> FromStr for Id<K> {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<K> From<Uuid> for Id<K> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<K> From<Id<K>> for Uuid {
    fn from(id: Id<K>) -> Self {
        id.uuid
    }
}

impl<K> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uuid.serialize(serializer)
    }
}

impl<'de, K> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_id_kind() {
        let err = "not-a-uuid".parse::<EventId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => {
                assert!(msg.starts_with("event id \"not-a-uuid\""), "{msg}");
            }
            other => panic!("expected InvalidId, got {other:?}"),
        }

        let err = SupplyId::parse("").unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(ref msg) if msg.starts_with("supply id")));
    }

    #[test]
    fn display_parses_back() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(ProductId::parse(&format!("  {id} ")).unwrap(), id);
    }

    #[test]
    fn debug_carries_the_kind() {
        let uuid = Uuid::nil();
        assert_eq!(
            format!("{:?}", EventId::from_uuid(uuid)),
            format!("event id({uuid})")
        );
    }

    #[test]
    fn serializes_as_a_bare_uuid() {
        let id = SupplyId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: SupplyId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn new_ids_are_v7() {
        assert_eq!(EventId::new().as_uuid().get_version_num(), 7);
        assert_ne!(EventId::new(), EventId::new());
    }
}
