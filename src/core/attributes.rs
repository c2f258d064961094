//! Attribute sets identifying one measurement series.
//!
//! A [`MetricAttributes`] keeps its pairs sorted by key with at most one
//! value per key, so two sets built in different insertion orders compare
//! and hash equal and can be used directly as hash-map keys.

use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Primitive attribute value.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value, compared and hashed by bit pattern
    Double(f64),
    /// String value
    String(Arc<str>),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<&opentelemetry::Value> for AttributeValue {
    fn from(value: &opentelemetry::Value) -> Self {
        match value {
            opentelemetry::Value::Bool(v) => Self::Bool(*v),
            opentelemetry::Value::I64(v) => Self::Int(*v),
            opentelemetry::Value::F64(v) => Self::Double(*v),
            opentelemetry::Value::String(v) => Self::String(Arc::from(v.as_str())),
            // Arrays have no primitive form; keep their rendered text
            other => Self::String(Arc::from(other.to_string())),
        }
    }
}

type Pairs = SmallVec<[(Arc<str>, AttributeValue); 4]>;

/// Ordered, deduplicated key/value set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MetricAttributes {
    pairs: Pairs,
}

impl MetricAttributes {
    /// Empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value for `key`.
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.binary_search_by(|(k, _)| (**k).cmp(&*key)) {
            Ok(idx) => self.pairs[idx].1 = value,
            Err(idx) => self.pairs.insert(idx, (key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<Arc<str>>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.pairs
            .binary_search_by(|(k, _)| (**k).cmp(key))
            .ok()
            .map(|idx| &self.pairs[idx].1)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.pairs.iter().map(|(k, v)| (&**k, v))
    }

    /// Copy keeping only pairs whose key passes `keep`.
    #[must_use]
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str) -> bool,
    {
        Self {
            pairs: self
                .pairs
                .iter()
                .filter(|(k, _)| keep(&**k))
                .cloned()
                .collect(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MetricAttributes
where
    K: Into<Arc<str>>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (key, value) in iter {
            attributes.insert(key, value);
        }
        attributes
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for MetricAttributes
where
    K: Into<Arc<str>>,
    V: Into<AttributeValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<&[opentelemetry::KeyValue]> for MetricAttributes {
    fn from(key_values: &[opentelemetry::KeyValue]) -> Self {
        key_values
            .iter()
            .map(|kv| (kv.key.as_str(), AttributeValue::from(&kv.value)))
            .collect()
    }
}

impl fmt::Display for MetricAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}
