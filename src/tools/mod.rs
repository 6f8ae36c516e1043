//! Tool implementations for go2web.
//!
//! This module contains the two operations callers invoke: fetching a URL
//! and searching the web.

pub mod fetch;
pub mod search;

pub use fetch::*;
pub use search::*;
