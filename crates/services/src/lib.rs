//! Daily content pipeline for an English-learning Instagram account.
//!
//! Everything lives under [`services`]; the `fluent-daily` binary only wires
//! configuration into these components and triggers one run.

pub mod services;
