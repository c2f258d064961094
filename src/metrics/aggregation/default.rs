//! Aggregation factory keyed by instrument kind.

use super::config::AggregationConfig;
use super::{
    Aggregation, DropAggregation, HistogramAggregation, LastValueAggregation, SumAggregation,
};
use crate::core::{AggregationType, InstrumentDescriptor, InstrumentType, InstrumentValueType};
use crate::metrics::data::PointData;

/// Creates aggregations for instruments.
///
/// Default mapping:
///
/// | Instrument kind                                  | Aggregation |
/// |--------------------------------------------------|-------------|
/// | Counter, UpDownCounter, Observable(UpDown)Counter | Sum        |
/// | Histogram                                        | Histogram   |
/// | ObservableGauge                                  | LastValue   |
/// | anything else                                    | Drop        |
pub struct DefaultAggregation;

impl DefaultAggregation {
    /// Family the instrument kind selects on its own.
    pub fn natural_type(descriptor: &InstrumentDescriptor) -> AggregationType {
        match descriptor.instrument_type {
            InstrumentType::Counter
            | InstrumentType::UpDownCounter
            | InstrumentType::ObservableCounter
            | InstrumentType::ObservableUpDownCounter => AggregationType::Sum,
            InstrumentType::Histogram => AggregationType::Histogram,
            InstrumentType::ObservableGauge => AggregationType::LastValue,
            InstrumentType::Unknown => AggregationType::Drop,
        }
    }

    /// `aggregation_type`, with `Default` replaced by the natural family.
    pub fn resolve(
        aggregation_type: AggregationType,
        descriptor: &InstrumentDescriptor,
    ) -> AggregationType {
        match aggregation_type {
            AggregationType::Default => Self::natural_type(descriptor),
            explicit => explicit,
        }
    }

    /// Aggregation chosen by the instrument kind.
    ///
    /// `config` only matters for histograms; without it the default
    /// boundaries apply.
    pub fn create_aggregation(
        descriptor: &InstrumentDescriptor,
        config: Option<&AggregationConfig>,
    ) -> Box<dyn Aggregation> {
        Self::build(Self::natural_type(descriptor), descriptor, config)
    }

    /// Aggregation of an explicit family, falling back to the instrument
    /// kind when `aggregation_type` is `Default`.
    pub fn create_aggregation_of_type(
        aggregation_type: AggregationType,
        descriptor: &InstrumentDescriptor,
        config: Option<&AggregationConfig>,
    ) -> Box<dyn Aggregation> {
        match aggregation_type {
            AggregationType::Default => Self::create_aggregation(descriptor, config),
            explicit => Self::build(explicit, descriptor, config),
        }
    }

    /// New aggregation of `aggregation_type` seeded with the current point
    /// of `to_copy`.
    ///
    /// `Drop` and `Default` ignore the existing state.
    ///
    /// # Panics
    ///
    /// If the point of `to_copy` belongs to another family than
    /// `aggregation_type`, or to the other numeric kind.
    pub fn clone_aggregation(
        aggregation_type: AggregationType,
        descriptor: &InstrumentDescriptor,
        to_copy: &dyn Aggregation,
    ) -> Box<dyn Aggregation> {
        let long = descriptor.value_type == InstrumentValueType::Long;
        match (aggregation_type, to_copy.to_point()) {
            (AggregationType::Drop, _) => Box::new(DropAggregation),
            (AggregationType::Default, _) => Self::create_aggregation(descriptor, None),
            (AggregationType::Sum, PointData::Sum(point)) if long => {
                Box::new(SumAggregation::<i64>::from_point(&point))
            },
            (AggregationType::Sum, PointData::Sum(point)) => {
                Box::new(SumAggregation::<f64>::from_point(&point))
            },
            (AggregationType::LastValue, PointData::LastValue(point)) if long => {
                Box::new(LastValueAggregation::<i64>::from_point(&point))
            },
            (AggregationType::LastValue, PointData::LastValue(point)) => {
                Box::new(LastValueAggregation::<f64>::from_point(&point))
            },
            (AggregationType::Histogram, PointData::Histogram(point)) if long => {
                Box::new(HistogramAggregation::<i64>::from_point(&point))
            },
            (AggregationType::Histogram, PointData::Histogram(point)) => {
                Box::new(HistogramAggregation::<f64>::from_point(&point))
            },
            (requested, point) => panic!(
                "cannot clone a {:?} aggregation into {:?} for instrument {}",
                point.aggregation_type(),
                requested,
                descriptor
            ),
        }
    }

    fn build(
        aggregation_type: AggregationType,
        descriptor: &InstrumentDescriptor,
        config: Option<&AggregationConfig>,
    ) -> Box<dyn Aggregation> {
        let long = descriptor.value_type == InstrumentValueType::Long;
        match aggregation_type {
            AggregationType::Sum => {
                let monotonic = descriptor.instrument_type.is_monotonic();
                if long {
                    Box::new(SumAggregation::<i64>::new(monotonic))
                } else {
                    Box::new(SumAggregation::<f64>::new(monotonic))
                }
            },
            AggregationType::LastValue => {
                if long {
                    Box::new(LastValueAggregation::<i64>::new())
                } else {
                    Box::new(LastValueAggregation::<f64>::new())
                }
            },
            AggregationType::Histogram => {
                let histogram = config.and_then(AggregationConfig::histogram);
                if long {
                    Box::new(HistogramAggregation::<i64>::new(histogram))
                } else {
                    Box::new(HistogramAggregation::<f64>::new(histogram))
                }
            },
            AggregationType::Drop | AggregationType::Default => Box::new(DropAggregation),
        }
    }
}
