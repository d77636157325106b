use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::ops::Index;

use serde::Serialize;

/// Open namespace of named entries, used for attributes, dimensions, groups and variables.
///
/// Entries are kept sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Container<V> {
    fields: BTreeMap<String, V>,
}

impl<V> Default for Container<V> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }
}

impl<V> Container<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a field, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of all assigned fields.
    pub fn list(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V: fmt::Display> Container<V> {
    /// Print every field name and its value to stdout.
    pub fn dir(&self) {
        if let Err(e) = self.write_dir(&mut io::stdout().lock()) {
            log::warn!("could not write fields to stdout: {e}");
        }
    }

    /// Write one `name value` line per field.
    pub fn write_dir<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (name, value) in &self.fields {
            writeln!(writer, "{name} {value}")?;
        }
        Ok(())
    }
}

impl<V: fmt::Display> fmt::Display for Container<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{name} {value}")?;
        }
        Ok(())
    }
}

impl<V> Index<&str> for Container<V> {
    type Output = V;

    fn index(&self, name: &str) -> &V {
        match self.fields.get(name) {
            Some(v) => v,
            None => panic!("no field named {name:?}"),
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Container<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V> IntoIterator for Container<V> {
    type Item = (String, V);
    type IntoIter = std::collections::btree_map::IntoIter<String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a Container<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = std::collections::btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
