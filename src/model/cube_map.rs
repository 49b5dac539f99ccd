//! Case-insensitive ordered row.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Key stored for blank keys.
pub const NULL_KEY: &str = "NULL";

static NULL: Value = Value::Null;

/// Ordered string-keyed map that uppercases every key on insert and lookup.
///
/// Re-inserting an existing key replaces the value in place, keeping the
/// original position.
#[derive(Clone, PartialEq)]
pub struct CubeMap<V = Value> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

/// One raw or output row.
pub type Row = CubeMap<Value>;

fn normalize_key(key: &str) -> String {
    if key.trim().is_empty() {
        NULL_KEY.to_string()
    } else {
        key.to_uppercase()
    }
}

impl<V> CubeMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let key = normalize_key(key);
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn with(mut self, key: &str, value: impl Into<V>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index
            .get(&normalize_key(key))
            .map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.index.get(&normalize_key(key)) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&normalize_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CubeMap<Value> {
    /// Lookup that yields `Null` for absent keys.
    pub fn value(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl<V> Default for CubeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for CubeMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: AsRef<str>, V> FromIterator<(K, V)> for CubeMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = CubeMap::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

impl From<serde_json::Map<String, Value>> for CubeMap<Value> {
    fn from(object: serde_json::Map<String, Value>) -> Self {
        object.into_iter().collect()
    }
}

impl From<CubeMap<Value>> for Value {
    fn from(map: CubeMap<Value>) -> Self {
        Value::Object(map.entries.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for CubeMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct CubeMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for CubeMapVisitor<V> {
    type Value = CubeMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string-keyed map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = CubeMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(&key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for CubeMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CubeMapVisitor(PhantomData))
    }
}

/// Numeric view of a JSON value; only JSON numbers qualify.
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}
