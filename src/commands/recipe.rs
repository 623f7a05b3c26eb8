// src/commands/recipe.rs
//! Recipe inspection

use anyhow::{Context, Result};
use setpm::recipe::RecipeSource;
use setpm::repository::RepositoryClient;
use setpm::Config;

/// Parse and validate a recipe; optionally print its canonical form
pub fn cmd_check(config: &Config, recipe: &str, print: bool) -> Result<()> {
    let client = RepositoryClient::new()?;
    let parsed = RecipeSource::new(config.recipe_index.clone(), &client)
        .resolve(recipe)
        .with_context(|| format!("Invalid recipe {}", recipe))?;

    if print {
        print!("{}", parsed.to_toml()?);
    } else {
        println!("[OK] {} ({})", parsed.package, parsed.download.url());
    }
    Ok(())
}
