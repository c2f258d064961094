//! Numeric value types shared by aggregations and storages.
//!
//! Long and double paths stay separate: every concrete aggregation is generic
//! over [`Number`] and only accepts the [`MetricValue`] variant it was built for.

use crate::core::InstrumentValueType;
use std::fmt;

/// A single recorded value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Integer measurement
    Long(i64),
    /// Floating point measurement
    Double(f64),
}

impl MetricValue {
    /// Numeric kind of this value.
    pub fn value_type(self) -> InstrumentValueType {
        match self {
            Self::Long(_) => InstrumentValueType::Long,
            Self::Double(_) => InstrumentValueType::Double,
        }
    }

    /// Integer payload, if this is a long.
    pub fn as_long(self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(v),
            Self::Double(_) => None,
        }
    }

    /// Float payload, if this is a double.
    pub fn as_double(self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(v),
            Self::Long(_) => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
        }
    }
}

/// Numeric kinds an aggregation can be generic over.
pub trait Number: Copy + PartialOrd + Default + fmt::Debug + Send + Sync + 'static {
    /// Instrument value type this number backs
    const VALUE_TYPE: InstrumentValueType;
    /// Smallest representable value, the identity for `max`
    const MIN: Self;
    /// Largest representable value, the identity for `min`
    const MAX: Self;

    /// Extract from a [`MetricValue`] of the matching kind.
    fn from_value(value: MetricValue) -> Option<Self>;
    /// Wrap into a [`MetricValue`].
    fn into_value(self) -> MetricValue;
    /// Addition, saturating for integers.
    fn plus(self, other: Self) -> Self;
    /// Subtraction, saturating for integers.
    fn minus(self, other: Self) -> Self;
    /// Lossy conversion used for bucket lookup.
    fn to_f64(self) -> f64;
}

impl Number for i64 {
    const VALUE_TYPE: InstrumentValueType = InstrumentValueType::Long;
    const MIN: Self = i64::MIN;
    const MAX: Self = i64::MAX;

    #[inline]
    fn from_value(value: MetricValue) -> Option<Self> {
        value.as_long()
    }

    #[inline]
    fn into_value(self) -> MetricValue {
        MetricValue::Long(self)
    }

    #[inline]
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    #[inline]
    fn minus(self, other: Self) -> Self {
        self.saturating_sub(other)
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Number for f64 {
    const VALUE_TYPE: InstrumentValueType = InstrumentValueType::Double;
    const MIN: Self = f64::MIN;
    const MAX: Self = f64::MAX;

    #[inline]
    fn from_value(value: MetricValue) -> Option<Self> {
        value.as_double()
    }

    #[inline]
    fn into_value(self) -> MetricValue {
        MetricValue::Double(self)
    }

    #[inline]
    fn plus(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn minus(self, other: Self) -> Self {
        self - other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}
