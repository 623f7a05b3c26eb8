// src/lib.rs

//! setpm: a source-based package manager
//!
//! One invocation takes one recipe end to end: fetch the source, verify it,
//! unpack it, run the configure/build/install steps into a per-version
//! cellar directory, and optionally expose the result under a shared prefix
//! as a symlink farm.
//!
//! # Layout
//!
//! - [`recipe`]: recipe model, parsing, discovery and the build pipeline
//! - [`filesystem`]: the cellar and the linker
//! - [`repository`]: HTTP transport and signature checking
//! - [`hash`], [`compression`]: digests and stream decoders

pub mod cancel;
pub mod compression;
pub mod config;
mod error;
pub mod filesystem;
pub mod hash;
pub mod recipe;
pub mod repository;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use filesystem::{Cellar, Linker};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use recipe::{CookResult, Kitchen, KitchenConfig, Package, PipelineError, Recipe, Stage};
