//! Aggregation selection: which algorithm a view applies to an instrument's
//! raw measurements (§4.2 "Aggregator selection rule").

use otel_api::metrics::{Advice, InstrumentType};
use std::sync::Arc;

const DEFAULT_HISTOGRAM_BOUNDARIES: &[f64] = &[0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0, 10000.0];

/// An aggregation strategy, resolved from either an explicit view or the
/// instrument's [`InstrumentType`] via [`Aggregation::resolve`].
#[derive(Clone, Debug)]
pub enum Aggregation {
    /// Defer to [`Aggregation::resolve`] at view-application time.
    Default,
    Sum { monotonic: bool },
    LastValue,
    ExplicitBucketHistogram { boundaries: Arc<[f64]> },
    Drop,
}

impl Aggregation {
    /// Resolves `Default` (and validates an explicit choice) against an
    /// instrument's type and advice. `ExplicitBucketHistogram` with no
    /// configured boundaries picks up the instrument's advice boundaries,
    /// falling back to the SDK default bucket set.
    pub fn resolve(&self, kind: InstrumentType, advice: &Advice) -> Aggregation {
        match self {
            Aggregation::Default => Self::default_for(kind, advice),
            Aggregation::ExplicitBucketHistogram { boundaries } if boundaries.is_empty() => {
                Aggregation::ExplicitBucketHistogram { boundaries: advice_or_default_boundaries(advice) }
            }
            other => other.clone(),
        }
    }

    fn default_for(kind: InstrumentType, advice: &Advice) -> Aggregation {
        use InstrumentType::*;
        match kind {
            Counter | ObservableCounter => Aggregation::Sum { monotonic: true },
            UpDownCounter | ObservableUpDownCounter => Aggregation::Sum { monotonic: false },
            Histogram => Aggregation::ExplicitBucketHistogram { boundaries: advice_or_default_boundaries(advice) },
            ObservableGauge => Aggregation::LastValue,
        }
    }

    pub fn is_compatible_with(&self, kind: InstrumentType) -> bool {
        match self {
            Aggregation::ExplicitBucketHistogram { .. } => matches!(kind, InstrumentType::Histogram | InstrumentType::Counter),
            _ => true,
        }
    }
}

fn advice_or_default_boundaries(advice: &Advice) -> Arc<[f64]> {
    advice.explicit_bucket_boundaries.clone().unwrap_or_else(|| Arc::from(DEFAULT_HISTOGRAM_BOUNDARIES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_defaults_to_monotonic_sum() {
        let agg = Aggregation::Default.resolve(InstrumentType::Counter, &Advice::default());
        assert!(matches!(agg, Aggregation::Sum { monotonic: true }));
    }

    #[test]
    fn up_down_counter_defaults_to_non_monotonic_sum() {
        let agg = Aggregation::Default.resolve(InstrumentType::UpDownCounter, &Advice::default());
        assert!(matches!(agg, Aggregation::Sum { monotonic: false }));
    }

    #[test]
    fn histogram_picks_up_advice_boundaries() {
        let advice = Advice { explicit_bucket_boundaries: Some(Arc::from([1.0, 2.0].as_slice())) };
        let agg = Aggregation::Default.resolve(InstrumentType::Histogram, &advice);
        match agg {
            Aggregation::ExplicitBucketHistogram { boundaries } => assert_eq!(&*boundaries, &[1.0, 2.0]),
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn observable_gauge_defaults_to_last_value() {
        let agg = Aggregation::Default.resolve(InstrumentType::ObservableGauge, &Advice::default());
        assert!(matches!(agg, Aggregation::LastValue));
    }
}
