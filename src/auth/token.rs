//! Access-token secrets and the buffered token cache.

pub mod cache;
pub mod secret;
