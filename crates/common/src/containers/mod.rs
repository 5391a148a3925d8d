//! Columnar containers that flow through the engine.
//!
//! Arrow arrays back every column; these wrappers add the engine's typing
//! rules (closed set of element types, same-type append, in-place row
//! filtering).

pub mod batch;
pub mod scalar;
pub mod schema;
pub mod vector;

pub use batch::Batch;
pub use scalar::ScalarValue;
pub use schema::{is_supported_type, SchemaExt};
pub use vector::Vector;
