//! GLS wire codecs
//!
//! All characteristic values are little-endian with optional fields gated
//! by flag bits. Decoders never read past the end of the supplied buffer.

mod cursor;
pub mod context;
pub mod datetime;
pub mod feature;
pub mod measurement;
pub mod racp;
pub mod sfloat;

pub use context::{
    Carbohydrate, CarbohydrateId, ContextFlags, Exercise, Meal, MeasurementContext, Medication,
    MedicationId, MedicationUnits, TesterHealth, CONTEXT_HEADER_SIZE,
};
pub use datetime::{DateTime, DATE_TIME_SIZE};
pub use feature::GlucoseFeatures;
pub use measurement::{
    ConcentrationUnits, GlucoseConcentration, GlucoseMeasurement, MeasurementFlags,
    SampleLocation, SampleType, SensorStatus, MEASUREMENT_HEADER_SIZE, TIME_OFFSET_OVERRUN,
    TIME_OFFSET_UNDERRUN,
};
pub use racp::{
    FilterType, RacpCommand, RacpOpcode, RacpOperand, RacpOperator, RacpResponse,
    RacpResponseCode,
};
pub use sfloat::SFloat;
