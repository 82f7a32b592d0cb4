//! # Trellis
//!
//! Trellis is a request-time compiler for property-graph stores. It takes a
//! resolved graph API request (a parsed, field-argument-resolved request
//! shape) together with read-only schema metadata, and lowers it into an
//! ordered tree of query fragments: pattern matches, filter predicates,
//! authorization guards, mutation writes and a final projection, ready for
//! literal-text emission and execution against the store.
//!
//! This crate is a thin facade over [`trellis_core`], which contains the
//! whole engine. The core crate is internal API and free to change between
//! patch versions; depend on this crate for a stable surface.

pub use trellis_core::catalog;
pub use trellis_core::cypher;
pub use trellis_core::err;
pub use trellis_core::resolve;
pub use trellis_core::translate;
pub use trellis_core::val;

pub use trellis_core::err::Error;
pub use trellis_core::translate::{
	CallbackBucket, CallbackRegistry, Operation, OperationFactory, TranslateContext, Transpiled,
};
