//! # Trellis Core
//!
//! This crate is the internal core library of Trellis. It lowers resolved
//! graph API requests into executable property-graph query programs, and
//! contains the whole translation engine on top of which the `trellis`
//! facade crate is implemented.
//!
//! <section class="warning">
//! <h3>Unstable!</h3>
//! This crate is <b>Trellis internal API</b>. It does not adhere to semver
//! and its API is free to change and break code even between patch versions.
//! If you are looking for a stable interface please depend on the
//! <code>trellis</code> crate instead.
//! </section>

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod catalog;
pub mod cnf;
pub mod cypher;
pub mod err;
pub mod fmt;
pub mod resolve;
pub mod translate;
pub mod val;
