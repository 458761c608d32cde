//! The record type shared by every level of the hierarchy.

use crate::EntityKind;

/// A single administrative unit.
///
/// All four kinds share this shape and differ only in whether `parent_id` is
/// populated. Identifiers are unique within a kind; they are the upsert
/// conflict key, so `parent_id` and `name` are the only mutable fields.
///
/// # Examples
///
/// ```
/// use regionkit_core::Entity;
///
/// let region = Entity::root("11", "Aceh");
/// let sub_region = Entity::child("1101", "11", "Simeulue");
///
/// assert!(region.parent_id.is_none());
/// assert_eq!(sub_region.parent_id.as_deref(), Some("11"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Entity {
    /// Unique code within the kind.
    pub id: String,
    /// Identifier of the parent row; `None` only for root entities.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub parent_id: Option<String>,
    /// Display name.
    pub name: String,
}

impl Entity {
    /// Construct a root entity.
    pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
        }
    }

    /// Construct an entity that references a parent row.
    pub fn child(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            name: name.into(),
        }
    }

    /// Whether the parent reference matches what `kind` requires.
    #[must_use]
    pub const fn fits(&self, kind: EntityKind) -> bool {
        kind.is_root() == self.parent_id.is_none()
    }
}

/// Ancestor constraint for hierarchical listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    /// Kind of the ancestor row.
    pub kind: EntityKind,
    /// Identifier of the ancestor row.
    pub id: String,
}

impl Ancestor {
    /// Construct an ancestor constraint.
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Shorthand for a [`EntityKind::Region`] ancestor.
    pub fn region(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Region, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Entity::root("11", "Aceh"), EntityKind::Region, true)]
    #[case(Entity::root("11", "Aceh"), EntityKind::District, false)]
    #[case(Entity::child("1101", "11", "Simeulue"), EntityKind::SubRegion, true)]
    #[case(Entity::child("1101", "11", "Simeulue"), EntityKind::Region, false)]
    fn checks_parent_shape(#[case] entity: Entity, #[case] kind: EntityKind, #[case] fits: bool) {
        assert_eq!(entity.fits(kind), fits);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn serialises_parent_in_camel_case() {
        let json = serde_json::to_string(&Entity::child("1101", "11", "Simeulue"))
            .expect("serialise entity");
        assert_eq!(json, r#"{"id":"1101","parentId":"11","name":"Simeulue"}"#);

        let root = serde_json::to_string(&Entity::root("11", "Aceh")).expect("serialise root");
        assert_eq!(root, r#"{"id":"11","name":"Aceh"}"#);
    }
}
