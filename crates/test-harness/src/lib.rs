//! Shared scaffolding for end-to-end layout tests: a labeled scene
//! builder over the engine, descriptor constructors, and assertion
//! helpers with diagnostic output.

pub mod assertions;
pub mod helpers;

pub use assertions::*;
pub use helpers::*;
