//! Loading module for the store ORM
//! Resolves the eager-load tree of a query onto its results

pub mod eager_loader;

pub use eager_loader::{EagerLoadStats, EagerLoader};
