// src/recipe/source.rs

//! Recipe discovery
//!
//! `set install foo.toml` reads a local file; `set install foo` asks the
//! configured recipe index for `<index>/foo`.

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use crate::recipe::parser::{parse_recipe, parse_recipe_file};
use crate::repository::HttpClient;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Where recipes come from
pub struct RecipeSource<'a> {
    index: Option<String>,
    client: &'a dyn HttpClient,
}

impl<'a> RecipeSource<'a> {
    pub fn new(index: Option<String>, client: &'a dyn HttpClient) -> Self {
        Self { index, client }
    }

    /// Resolve a local path or a recipe name into a parsed recipe
    pub fn resolve(&self, name_or_path: &str) -> Result<Recipe> {
        let path = Path::new(name_or_path);
        if path.is_file() {
            debug!("Reading recipe from {}", path.display());
            return parse_recipe_file(path);
        }

        let bytes = self.fetch(name_or_path)?;
        parse_recipe(&bytes)
    }

    /// Fetch raw recipe bytes for `name` from the index
    pub fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let not_found = |reason: String| Error::RecipeNotFound {
            name: name.to_string(),
            reason,
        };

        let Some(index) = &self.index else {
            return Err(not_found(
                "no such file and no recipe index configured".to_string(),
            ));
        };
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(not_found("not a valid recipe name".to_string()));
        }

        let url = format!("{}/{}", index.trim_end_matches('/'), name);
        info!("Fetching recipe {} from {}", name, url);

        let mut response = self.client.get(&url)?;
        if !response.is_success() {
            return Err(not_found(format!("HTTP {} from {}", response.status, url)));
        }

        let mut bytes = Vec::new();
        response
            .body
            .read_to_end(&mut bytes)
            .map_err(|e| Error::fetch(&url, e))?;
        Ok(bytes)
    }
}
