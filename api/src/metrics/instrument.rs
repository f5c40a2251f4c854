use std::sync::Arc;

/// The shape of an instrument: whether it is synchronous or observable, and
/// whether increments are restricted to being non-negative (monotonic).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentType {
    Counter,
    UpDownCounter,
    Histogram,
    ObservableCounter,
    ObservableUpDownCounter,
    ObservableGauge,
}

impl InstrumentType {
    /// Counters only ever increase; up/down counters and gauges may decrease.
    pub fn is_monotonic(&self) -> bool {
        matches!(self, InstrumentType::Counter | InstrumentType::ObservableCounter)
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self, InstrumentType::Counter | InstrumentType::UpDownCounter | InstrumentType::Histogram)
    }
}

/// The numeric representation an instrument records in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentValueType {
    Long,
    Double,
}

/// Hints from the instrumentation author that influence default aggregation,
/// e.g. explicit histogram bucket boundaries. Ignored for identity purposes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Advice {
    pub explicit_bucket_boundaries: Option<Arc<[f64]>>,
}

/// Identifies an instrument within a meter: name, description, unit, kind,
/// value type, and author-supplied advice.
///
/// Identity (used for duplicate-registration detection) is the case-insensitive
/// name plus [`InstrumentType`] plus [`InstrumentValueType`] plus unit --
/// `advice` and any source-location metadata are excluded from identity.
#[derive(Clone, Debug)]
pub struct InstrumentDescriptor {
    pub name: Arc<str>,
    pub description: Arc<str>,
    pub unit: Arc<str>,
    pub kind: InstrumentType,
    pub value_type: InstrumentValueType,
    pub advice: Advice,
}

impl InstrumentDescriptor {
    pub fn new(name: impl Into<Arc<str>>, kind: InstrumentType, value_type: InstrumentValueType) -> Self {
        InstrumentDescriptor {
            name: name.into(),
            description: Arc::from(""),
            unit: Arc::from(""),
            kind,
            value_type,
            advice: Advice::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice = advice;
        self
    }

    /// The key used to detect duplicate/colliding registrations: everything
    /// but `description` and `advice` -- two descriptors that collide on this
    /// key but differ in description MUST trigger a duplicate-registration warning.
    pub fn identity_key(&self) -> InstrumentIdentity {
        InstrumentIdentity {
            name_lowercase: self.name.to_lowercase(),
            unit: self.unit.clone(),
            kind: self.kind,
            value_type: self.value_type,
        }
    }
}

/// The subset of [`InstrumentDescriptor`] fields that determine identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstrumentIdentity {
    pub name_lowercase: String,
    pub unit: Arc<str>,
    pub kind: InstrumentType,
    pub value_type: InstrumentValueType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_case_insensitive_on_name() {
        let a = InstrumentDescriptor::new("Http.Requests", InstrumentType::Counter, InstrumentValueType::Long);
        let b = InstrumentDescriptor::new("http.requests", InstrumentType::Counter, InstrumentValueType::Long);
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_ignores_description_and_advice() {
        let a = InstrumentDescriptor::new("reqs", InstrumentType::Counter, InstrumentValueType::Long).with_description("a");
        let b = InstrumentDescriptor::new("reqs", InstrumentType::Counter, InstrumentValueType::Long).with_description("b");
        assert_eq!(a.identity_key(), b.identity_key());
    }
}
