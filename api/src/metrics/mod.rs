//! Instrument identity types shared between instrumented code and the SDK's
//! meter/aggregation pipeline.

mod instrument;

pub use instrument::{Advice, InstrumentDescriptor, InstrumentIdentity, InstrumentType, InstrumentValueType};
