//! Guardrail (checkpoint) definitions.
//!
//! A guardrail is an ordered, versioned list of constraints. Definitions are
//! structured data validated against JSON Schema; this module handles
//! parsing YAML/JSON definitions and validating them.

mod parser;
mod schema;

pub use parser::{Constraint, GuardRail, GuardRailBuilder, GuardRailError};
pub use schema::validate_definition_schema;
