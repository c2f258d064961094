//! Attribute rewriting applied before a measurement is keyed.

use crate::core::MetricAttributes;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

/// Maps recorded attributes to the attribute set a storage keys on.
pub trait AttributesProcessor: fmt::Debug + Send + Sync {
    /// Effective attributes for a measurement.
    fn process<'a>(&self, attributes: &'a MetricAttributes) -> Cow<'a, MetricAttributes>;
}

/// Keeps attributes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAttributesProcessor;

impl AttributesProcessor for DefaultAttributesProcessor {
    #[inline]
    fn process<'a>(&self, attributes: &'a MetricAttributes) -> Cow<'a, MetricAttributes> {
        Cow::Borrowed(attributes)
    }
}

/// Keeps only an allow-list of keys.
#[derive(Debug, Clone, Default)]
pub struct FilteringAttributesProcessor {
    allowed: HashSet<String, ahash::RandomState>,
}

impl FilteringAttributesProcessor {
    /// Processor keeping `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributesProcessor for FilteringAttributesProcessor {
    fn process<'a>(&self, attributes: &'a MetricAttributes) -> Cow<'a, MetricAttributes> {
        if attributes.iter().all(|(key, _)| self.allowed.contains(key)) {
            Cow::Borrowed(attributes)
        } else {
            Cow::Owned(attributes.filtered(|key| self.allowed.contains(key)))
        }
    }
}
