// src/repository/mod.rs

//! Remote access
//!
//! This module provides:
//! - The [`HttpClient`] transport seam and its reqwest implementation
//! - Streamed, cancellable downloads into the workspace
//! - OpenPGP detached-signature verification against a keyring directory

mod client;

pub mod gpg;

pub use client::{download_file, get_success, HttpClient, HttpResponse, RepositoryClient};
pub use gpg::GpgVerifier;
