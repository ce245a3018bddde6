use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category -> items, keeping both categories and items in arrival order.
///
/// Serializes as a JSON object whose key order is the insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouped<T> {
    groups: Vec<(String, Vec<T>)>,
}

impl<T> Default for Grouped<T> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<T> Grouped<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: &str, item: T) {
        self.group_mut(category).push(item);
    }

    pub fn extend(&mut self, category: &str, items: impl IntoIterator<Item = T>) {
        self.group_mut(category).extend(items);
    }

    /// Returns the group for `category`, creating an empty one at the end if needed.
    pub fn group_mut(&mut self, category: &str) -> &mut Vec<T> {
        let idx = match self.groups.iter().position(|(c, _)| c == category) {
            Some(idx) => idx,
            None => {
                self.groups.push((category.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx].1
    }

    pub fn get(&self, category: &str) -> Option<&[T]> {
        self.groups
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, items)| items.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups
            .iter()
            .map(|(c, items)| (c.as_str(), items.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> FromIterator<(String, T)> for Grouped<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut grouped = Grouped::new();
        for (category, item) in iter {
            grouped.push(&category, item);
        }
        grouped
    }
}

impl<T: Serialize> Serialize for Grouped<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (category, items) in &self.groups {
            map.serialize_entry(category, items)?;
        }
        map.end()
    }
}

struct GroupedVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for GroupedVisitor<T> {
    type Value = Grouped<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of category to list")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut grouped = Grouped::new();
        while let Some((category, items)) = access.next_entry::<String, Vec<T>>()? {
            grouped.extend(&category, items);
        }
        Ok(grouped)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Grouped<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(GroupedVisitor(PhantomData))
    }
}
