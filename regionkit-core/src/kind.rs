//! Entity-kind metadata for the four-level administrative hierarchy.
//!
//! Every pipeline stage is parameterised by [`EntityKind`] rather than
//! duplicated per level. The [`KindSchema`] attached to each kind carries the
//! table name, the parent column, the golden-source file name and the names
//! used by external surfaces.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// One level of the administrative hierarchy, ordered root first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum EntityKind {
    /// Top-level region (the root of the tree).
    Region,
    /// Sub-region, parented by a [`EntityKind::Region`].
    SubRegion,
    /// District, parented by a [`EntityKind::SubRegion`].
    District,
    /// Settlement, the smallest unit, parented by a [`EntityKind::District`].
    Settlement,
}

/// Static description of how a kind is stored and ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchema {
    /// Table holding rows of this kind.
    pub table: &'static str,
    /// Column referencing the parent row, absent for the root kind.
    pub parent_column: Option<&'static str>,
    /// Kind referenced by `parent_column`.
    pub parent: Option<EntityKind>,
    /// Distance from the root kind.
    pub depth: usize,
    /// Singular, human-readable label.
    pub label: &'static str,
    /// Plural name used in listings and request paths.
    pub plural: &'static str,
    /// File name of the golden-source CSV.
    pub source_file: &'static str,
}

const REGION: KindSchema = KindSchema {
    table: "regions",
    parent_column: None,
    parent: None,
    depth: 0,
    label: "region",
    plural: "regions",
    source_file: "regions.csv",
};

const SUB_REGION: KindSchema = KindSchema {
    table: "sub_regions",
    parent_column: Some("region_id"),
    parent: Some(EntityKind::Region),
    depth: 1,
    label: "sub-region",
    plural: "sub-regions",
    source_file: "sub_regions.csv",
};

const DISTRICT: KindSchema = KindSchema {
    table: "districts",
    parent_column: Some("sub_region_id"),
    parent: Some(EntityKind::SubRegion),
    depth: 2,
    label: "district",
    plural: "districts",
    source_file: "districts.csv",
};

const SETTLEMENT: KindSchema = KindSchema {
    table: "settlements",
    parent_column: Some("district_id"),
    parent: Some(EntityKind::District),
    depth: 3,
    label: "settlement",
    plural: "settlements",
    source_file: "settlements.csv",
};

impl EntityKind {
    /// All kinds, root first. Synchronizing in this order keeps parents ahead
    /// of their children.
    pub const ALL: [Self; 4] = [Self::Region, Self::SubRegion, Self::District, Self::Settlement];

    /// Storage and ingestion metadata for this kind.
    #[must_use]
    pub const fn schema(self) -> &'static KindSchema {
        match self {
            Self::Region => &REGION,
            Self::SubRegion => &SUB_REGION,
            Self::District => &DISTRICT,
            Self::Settlement => &SETTLEMENT,
        }
    }

    /// Kind of the parent row, or `None` for the root.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        self.schema().parent
    }

    /// Whether this kind is the root of the hierarchy.
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.schema().parent.is_none()
    }

    /// Distance from the root kind.
    #[must_use]
    pub const fn depth(self) -> usize {
        self.schema().depth
    }

    /// Number of CSV fields a golden-source row of this kind must carry.
    #[must_use]
    pub const fn field_count(self) -> usize {
        if self.is_root() { 2 } else { 3 }
    }

    /// Number of parent hops from this kind up to `ancestor`, or `None` when
    /// `ancestor` is not strictly above this kind.
    ///
    /// # Examples
    /// ```
    /// use regionkit_core::EntityKind;
    ///
    /// assert_eq!(EntityKind::Settlement.hops_to(EntityKind::Region), Some(3));
    /// assert_eq!(EntityKind::SubRegion.hops_to(EntityKind::Region), Some(1));
    /// assert_eq!(EntityKind::Region.hops_to(EntityKind::Region), None);
    /// ```
    #[must_use]
    pub const fn hops_to(self, ancestor: Self) -> Option<usize> {
        let own = self.depth();
        let other = ancestor.depth();
        if other < own { Some(own - other) } else { None }
    }

    /// Plural name, e.g. `sub-regions`.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        self.schema().plural
    }

    /// Singular label, e.g. `sub-region`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        self.schema().label
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no known kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity kind '{input}' (expected regions, sub-regions, districts or settlements)")]
pub struct UnknownKind {
    /// The rejected input.
    pub input: String,
}

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| normalised == kind.plural() || normalised == kind.label())
            .ok_or_else(|| UnknownKind {
                input: s.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("regions", EntityKind::Region)]
    #[case("Region", EntityKind::Region)]
    #[case("sub-regions", EntityKind::SubRegion)]
    #[case("sub_region", EntityKind::SubRegion)]
    #[case(" districts ", EntityKind::District)]
    #[case("SETTLEMENTS", EntityKind::Settlement)]
    fn parses_plural_and_singular_names(#[case] input: &str, #[case] expected: EntityKind) {
        assert_eq!(input.parse::<EntityKind>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_names() {
        let err = "provinces".parse::<EntityKind>().expect_err("unknown kind");
        assert_eq!(err.input, "provinces");
    }

    #[rstest]
    fn parent_chain_reaches_root() {
        let mut current = EntityKind::Settlement;
        let mut hops = 0;
        while let Some(parent) = current.parent() {
            assert_eq!(parent.depth() + 1, current.depth());
            current = parent;
            hops += 1;
        }
        assert_eq!(current, EntityKind::Region);
        assert_eq!(hops, 3);
    }

    #[rstest]
    fn only_root_lacks_parent_column() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.is_root(), kind.schema().parent_column.is_none());
            assert_eq!(kind.field_count(), if kind.is_root() { 2 } else { 3 });
        }
    }

    #[rstest]
    #[case(EntityKind::District, EntityKind::Settlement)]
    #[case(EntityKind::Region, EntityKind::Region)]
    fn hops_reject_non_ancestors(#[case] kind: EntityKind, #[case] ancestor: EntityKind) {
        assert_eq!(kind.hops_to(ancestor), None);
    }
}
