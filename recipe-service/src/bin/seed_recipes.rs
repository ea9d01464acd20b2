use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use recipe_service::cache::RedisCache;
use recipe_service::config::redis_key_prefix;
use recipe_service::metrics::ServiceMetrics;
use recipe_service::models::RecipeInput;
use recipe_service::repository::RecipeRepository;
use recipe_service::store::PgRecipeStore;
use sqlx::PgPool;

#[derive(Parser, Debug)]
#[command(about = "Bulk-load recipes from a JSON array", long_about = None)]
struct Options {
    /// JSON file holding an array of recipes (`name`, `ingredients`, `instructions`, `tags`)
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Options::parse();

    let raw = std::fs::read_to_string(&opts.file)
        .with_context(|| format!("Failed to read {}", opts.file.display()))?;
    let inputs: Vec<RecipeInput> =
        serde_json::from_str(&raw).context("Seed file must be a JSON array of recipes")?;
    if let Some(index) = inputs.iter().position(|input| !input.is_valid()) {
        return Err(anyhow!("Recipe at index {index} has no name"));
    }

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set for seeding recipes")?;
    let redis_url =
        std::env::var("REDIS_URL").context("REDIS_URL must be set for seeding recipes")?;
    let prefix = redis_key_prefix(std::env::var("REDIS_KEY_PREFIX").ok());

    let pool = PgPool::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let cache = RedisCache::connect(&redis_url, prefix).await?;

    // Each create invalidates the cached snapshot, so readers see the seeded rows immediately.
    let repository = RecipeRepository::new(
        Arc::new(PgRecipeStore::new(pool)),
        Arc::new(cache),
        ServiceMetrics::new()?,
    );

    let total = inputs.len();
    for input in inputs {
        let recipe = repository.create(input).await?;
        println!("seeded {} ({})", recipe.name, recipe.id);
    }
    println!("seeded {total} recipes");

    Ok(())
}
