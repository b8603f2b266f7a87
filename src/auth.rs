//! Auth-domain identifiers, key material, and access-token models.

pub mod id;
pub mod key;
pub mod token;

pub use id::*;
pub use key::*;
pub use token::{cache::*, secret::*};
