// statepipe/src/pipeline/mod.rs

//! Defines the `Pipeline<Env>` struct, its construction, builder methods and execution logic.

pub mod builder;
pub mod definition;
pub mod execution;

// Re-export the main Pipeline struct
pub use definition::Pipeline;
