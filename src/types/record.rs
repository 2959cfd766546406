use serde::Serialize;
use std::collections::BTreeMap;

use super::{Error, Key, Value};

/// Maximum length in bytes of a bin name accepted by the store.
pub const BIN_NAME_MAX_LEN: usize = 15;

fn validate_bin_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::EmptyBinName);
    }
    if name.len() > BIN_NAME_MAX_LEN {
        return Err(Error::BinNameTooLong(name.to_owned()));
    }
    Ok(())
}

/// A single named field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    name: String,
    value: Value,
}

impl Bin {
    pub fn try_new(name: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        let name = name.into();
        validate_bin_name(&name)?;
        Ok(Self {
            name,
            value: value.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Ordered mapping from bin name to value, the payload of a write and the
/// content of a read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BinMap(BTreeMap<String, Value>);

impl BinMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a bin, validating its name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), Error> {
        let name = name.into();
        validate_bin_name(&name)?;
        self.0.insert(name, value.into());
        Ok(())
    }

    /// Builder flavour of [`BinMap::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    /// Inserts without validation, used for values coming back from the store.
    pub(crate) fn insert_unchecked(&mut self, name: String, value: Value) {
        self.0.insert(name, value);
    }
}

impl IntoIterator for BinMap {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl std::fmt::Display for BinMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "map[")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{k}:{v}")?;
        }
        write!(f, "]")
    }
}

/// A set of bins addressed by a unique [`Key`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub bins: BinMap,
    /// Number of times the record has been modified.
    pub generation: u32,
}

impl Record {
    pub fn new(key: Key, bins: BinMap, generation: u32) -> Self {
        Self {
            key,
            bins,
            generation,
        }
    }

    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}
