// src/filesystem/mod.rs

//! Filesystem side of an install
//!
//! - [`Cellar`]: one directory per installed (name, version)
//! - [`Linker`]: symlink farm exposing cellar entries under a shared prefix
//! - [`path`]: sanitization of untrusted relative paths

mod cellar;
mod linker;
pub mod path;

pub use cellar::Cellar;
pub use linker::{link_set, LinkReport, Linker, UnlinkReport};
