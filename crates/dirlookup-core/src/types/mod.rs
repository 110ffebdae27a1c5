//! Core types for dirlookup

mod directory;
mod user;

pub use directory::*;
pub use user::*;
