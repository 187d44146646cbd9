//! Assembly item references used as annotation targets.
//!
//! # Responsibility
//! - Define the opaque, comparable key of one assembly item.
//! - Define the optional qualifier that refines an item reference.
//!
//! # Invariants
//! - `AssemblyItemId` entries are trimmed, non-empty and free of `/`, so
//!   the text form round-trips to an equal id.
//! - Two references denote the same annotated item iff item key and
//!   qualifier are both equal.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

const PATH_SEPARATOR: char = '/';

/// Path of label entries identifying one assembly item, e.g. `0:1:1:1/0:1:1:2`.
///
/// The empty path is the null id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssemblyItemId {
    path: Vec<String>,
}

impl AssemblyItemId {
    /// Builds an id from path entries.
    ///
    /// Entries containing `/` are split into several levels; blank levels
    /// are skipped and the rest trimmed.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Vec::new();
        for entry in entries {
            let entry: String = entry.into();
            path.extend(
                entry
                    .split(PATH_SEPARATOR)
                    .map(str::trim)
                    .filter(|level| !level.is_empty())
                    .map(str::to_string),
            );
        }
        Self { path }
    }

    /// Parses the `/`-joined text form.
    pub fn parse(text: &str) -> Self {
        Self::new([text])
    }

    pub fn is_null(&self) -> bool {
        self.path.is_empty()
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns whether `self` lies strictly below `other` in the assembly.
    pub fn is_child(&self, other: &AssemblyItemId) -> bool {
        !other.is_null()
            && self.path.len() > other.path.len()
            && self.path.starts_with(&other.path)
    }

    /// Returns whether `self` lies exactly one level below `other`.
    pub fn is_direct_child(&self, other: &AssemblyItemId) -> bool {
        self.path.len() == other.path.len() + 1 && self.is_child(other)
    }
}

impl Display for AssemblyItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, entry) in self.path.iter().enumerate() {
            if index > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl FromStr for AssemblyItemId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for AssemblyItemId {
    fn from(value: String) -> Self {
        Self::parse(value.as_str())
    }
}

impl From<AssemblyItemId> for String {
    fn from(value: AssemblyItemId) -> Self {
        value.to_string()
    }
}

/// Optional refinement of an item reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ItemQualifier {
    /// The whole assembly item.
    None,
    /// One attribute of the item, identified by its type GUID.
    Attribute(Uuid),
    /// One sub-shape of the item, identified by its index.
    Subshape(u32),
}

impl ItemQualifier {
    /// Stable storage/CLI tag for this qualifier kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Attribute(_) => "attribute",
            Self::Subshape(_) => "subshape",
        }
    }
}

/// Qualified reference stored on one annotated item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotatedItemRef {
    pub item: AssemblyItemId,
    pub qualifier: ItemQualifier,
}

impl AnnotatedItemRef {
    pub fn new(item: AssemblyItemId, qualifier: ItemQualifier) -> Self {
        Self { item, qualifier }
    }

    /// Returns whether this reference carries an attribute or sub-shape qualifier.
    pub fn has_extra_ref(&self) -> bool {
        self.qualifier != ItemQualifier::None
    }

    pub fn guid(&self) -> Option<Uuid> {
        match self.qualifier {
            ItemQualifier::Attribute(guid) => Some(guid),
            _ => None,
        }
    }

    pub fn subshape_index(&self) -> Option<u32> {
        match self.qualifier {
            ItemQualifier::Subshape(index) => Some(index),
            _ => None,
        }
    }

    pub(crate) fn matches(&self, item: &AssemblyItemId, qualifier: &ItemQualifier) -> bool {
        self.item == *item && self.qualifier == *qualifier
    }
}

impl Display for AnnotatedItemRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.qualifier {
            ItemQualifier::None => write!(f, "{}", self.item),
            ItemQualifier::Attribute(guid) => write!(f, "{} [attr {guid}]", self.item),
            ItemQualifier::Subshape(index) => write!(f, "{} [subshape {index}]", self.item),
        }
    }
}

/// Stable identifier of one annotated item record.
pub type AnnotatedItemId = Uuid;

/// Registry record for one annotated (possibly qualified) assembly item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    pub id: AnnotatedItemId,
    pub reference: AnnotatedItemRef,
}

impl AnnotatedItem {
    /// Creates a record with a generated stable ID.
    pub fn new(reference: AnnotatedItemRef) -> Self {
        Self::with_id(Uuid::new_v4(), reference)
    }

    pub fn with_id(id: AnnotatedItemId, reference: AnnotatedItemRef) -> Self {
        Self { id, reference }
    }
}
