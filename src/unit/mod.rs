mod parameter;
mod registry;
mod unit;

pub use parameter::{ParamType, Parameter, default_parameters, validate_parameters};
pub use registry::{UnitRegistry, UnitRemoval, UnitResolution};
pub use unit::{Position, UnitId, UnitInstance};
