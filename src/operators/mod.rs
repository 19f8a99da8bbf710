//! Operator registry, engine facade and built-in operators.

pub mod builtin;
pub mod engine;
pub mod registry;

pub use engine::Engine;
pub use registry::OperatorRegistry;
