//! Platform-specific connectors
//!
//! Each connector implements the GraphApi trait for a specific platform.

pub mod instagram;
