//! The set of attributes the collector asked us to sample.

use std::str::FromStr;

use thiserror::Error;

use crate::error::PushError;
use crate::protocol::Record;

/// One subscribed management attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    id: String,
    name_pattern: String,
    attribute_path: String,
    periodic: bool,
}

impl Item {
    /// Creates a new item.
    pub fn new(
        id: impl Into<String>,
        name_pattern: impl Into<String>,
        attribute_path: impl Into<String>,
        periodic: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name_pattern: name_pattern.into(),
            attribute_path: attribute_path.into(),
            periodic,
        }
    }

    /// Parses an item from its id and a `namePattern|attributePath|periodic`
    /// descriptor.
    pub fn from_descriptor(id: &str, descriptor: &str) -> Result<Item, DescriptorError> {
        let descriptor: Descriptor = descriptor.parse()?;
        Ok(Item {
            id: id.to_owned(),
            name_pattern: descriptor.name_pattern,
            attribute_path: descriptor.attribute_path,
            periodic: descriptor.periodic,
        })
    }

    /// The key this item's samples are reported under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The bean name or name pattern to query.
    pub fn name_pattern(&self) -> &str {
        &self.name_pattern
    }

    /// The possibly dotted attribute path to read.
    pub fn attribute_path(&self) -> &str {
        &self.attribute_path
    }

    /// Whether the item is resampled on every push or sent once.
    pub fn is_periodic(&self) -> bool {
        self.periodic
    }
}

/// A descriptor that does not have the `pattern|path|flag` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed item descriptor '{0}'")]
pub struct DescriptorError(String);

impl From<DescriptorError> for PushError {
    fn from(err: DescriptorError) -> Self {
        PushError::Protocol(err.to_string())
    }
}

struct Descriptor {
    name_pattern: String,
    attribute_path: String,
    periodic: bool,
}

impl FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name_pattern), Some(attribute_path), Some(flag)) => Ok(Descriptor {
                name_pattern: name_pattern.to_owned(),
                attribute_path: attribute_path.to_owned(),
                periodic: flag.trim().eq_ignore_ascii_case("true"),
            }),
            _ => Err(DescriptorError(s.to_owned())),
        }
    }
}

/// The mutable, ordered set of subscribed items.
///
/// Ids are unique: adding an item whose id is already present replaces the
/// existing item in place.
#[derive(Clone, Debug, Default)]
pub struct ItemRegistry {
    items: Vec<Item>,
}

impl ItemRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an item.
    pub fn insert(&mut self, item: Item) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Merges every entry of a response record as an item descriptor.
    ///
    /// Reserved keys must already be removed. The merge is all or nothing:
    /// a single malformed descriptor rejects the whole record. Returns the
    /// number of merged items.
    pub fn merge(&mut self, descriptors: Record) -> Result<usize, DescriptorError> {
        let items = descriptors
            .iter()
            .map(|(id, descriptor)| Item::from_descriptor(id, descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        let count = items.len();
        for item in items {
            self.insert(item);
        }
        Ok(count)
    }

    /// Looks up an item by id.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Returns `true` if an item with this id is subscribed.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterates the items in subscription order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Keeps only the items for which `keep` returns `true`.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Item) -> bool,
    {
        self.items.retain(keep);
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
