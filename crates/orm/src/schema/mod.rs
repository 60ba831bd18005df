//! Normalization of nested payloads into flat per-model tables

pub mod builder;
pub mod normalizer;

pub use builder::{NormalizationSchema, SchemaBuilder};
pub use normalizer::{NormalizedData, Normalizer};
