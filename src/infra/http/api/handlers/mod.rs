//! Demo API handlers, split by concern.

mod demo;
mod identity;

pub use demo::*;
pub use identity::*;

/// Page size used when the query string omits one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
