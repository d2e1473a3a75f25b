use crate::relations::RelationClass;
use serde::Serialize;
use serde_json::{Map, Value};

/// The three citation-direction buckets of a processed entity. Each bucket
/// is an ordered set: insertion order, no duplicates.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RelationBuckets {
    #[serde(rename = "Cites")]
    pub cites: Vec<String>,
    #[serde(rename = "IsCitedBy")]
    pub is_cited_by: Vec<String>,
    #[serde(rename = "IsPartOf", skip_serializing_if = "Vec::is_empty")]
    pub is_part_of: Vec<String>,
}

impl RelationBuckets {
    /// Appends a normalized identifier to the bucket for `class`, preserving
    /// insertion order and skipping duplicates. Returns whether the
    /// identifier was new to that bucket.
    pub fn push(&mut self, class: RelationClass, normalized: String) -> bool {
        let bucket = match class {
            RelationClass::Cites => &mut self.cites,
            RelationClass::IsCitedBy => &mut self.is_cited_by,
            RelationClass::IsPartOf => &mut self.is_part_of,
            RelationClass::Discard => return false,
        };
        if bucket.contains(&normalized) {
            return false;
        }
        bucket.push(normalized);
        true
    }

    /// Whether the entity is involved in any citation. IsPartOf alone does
    /// not qualify: a venue link without citation links is not worth keeping.
    pub fn has_citations(&self) -> bool {
        !self.cites.is_empty() || !self.is_cited_by.is_empty()
    }
}

/// A creator or contributor kept on a processed entity: its allow-listed
/// descriptive fields verbatim, plus resolved agent identifiers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Agent {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(rename = "nameIdentifiers")]
    pub name_identifiers: Vec<String>,
}

/// The venue/container record of a processed entity: allow-listed fields
/// verbatim, plus at most one resolved container identifier.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Container {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub identifier: Vec<String>,
}

/// An entity that survived citation filtering. Immutable once assembled;
/// owned by the chunk writer's buffer until flushed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessedEntity {
    pub doi: String,
    #[serde(flatten)]
    pub kept: Map<String, Value>,
    #[serde(rename = "relatedIdentifiers")]
    pub related_identifiers: RelationBuckets,
    pub creators: Vec<Agent>,
    pub contributors: Vec<Agent>,
    pub identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
}
