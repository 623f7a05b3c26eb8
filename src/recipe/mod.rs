// src/recipe/mod.rs

//! Recipes and the kitchen that cooks them
//!
//! A recipe names one package, where its source comes from and how to build
//! it:
//!
//! ```toml
//! [package]
//! name = "foo"
//! version = "1.0"
//!
//! [download]
//! url = "https://example.org/foo-1.0.tar.gz"
//!
//! [download.verify]
//! sha512 = "..."
//!
//! [build.configure]
//! cmd = "./configure"
//!
//! [build.build]
//! [build.install]
//! ```
//!
//! - [`format`]: the validated in-memory model
//! - [`parser`]: TOML/YAML documents to and from that model
//! - [`source`]: finding a recipe by path or by name in a recipe index
//! - [`kitchen`]: the fetch, verify, extract and build pipeline

pub mod format;
pub mod kitchen;
pub mod parser;
pub mod source;

pub use format::{
    BuildSpec, DownloadSpec, Package, Phase, Recipe, SourceRefDownload, StepContext, StepGroup,
    UrlDownload, ValidationError, VerifySpec,
};
pub use kitchen::{CookResult, Kitchen, KitchenConfig, PipelineError, Stage};
pub use parser::{parse_recipe, parse_recipe_as, parse_recipe_file, RecipeFormat};
pub use source::RecipeSource;
