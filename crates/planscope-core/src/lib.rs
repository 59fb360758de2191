//! planscope core - shared abstractions for plan analysis
//!
//! This crate provides the narrow database contract the analyzer depends on:
//!
//! - `Connection` - Trait for executing statements and queries
//! - `PlanSource` - Trait for acquiring a connection per analysis
//! - Common types like `Value`, `Row`, `QueryResult`
//! - `PlanscopeError` and the crate-wide `Result` alias

mod connection;
mod error;
mod types;

pub use connection::*;
pub use error::*;
pub use types::*;
