//! Auth-domain identifiers, scope lists, and token models.

pub mod id;
pub mod scope;
pub mod token;

pub use id::*;
pub use scope::*;
pub use token::{bundle::*, secret::*};
