use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::CacheBackend;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::ServiceMetrics;
use crate::models::{Recipe, RecipeInput};
use crate::store::RecipeStore;

/// Cache key holding the JSON snapshot of the whole collection.
pub const RECIPES_CACHE_KEY: &str = "recipes";

/// Read-through / write-invalidate access to recipes.
///
/// Reads go through the cached collection snapshot; every committed write drops it.
/// Concurrent misses may repopulate the snapshot more than once, and a reader that
/// loaded from the store before a write can write back a stale snapshot after that
/// write's invalidation. The next write clears it.
#[derive(Clone)]
pub struct RecipeRepository {
    store: Arc<dyn RecipeStore>,
    cache: Arc<dyn CacheBackend>,
    metrics: ServiceMetrics,
}

impl RecipeRepository {
    pub fn new(
        store: Arc<dyn RecipeStore>,
        cache: Arc<dyn CacheBackend>,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Recipe>> {
        let cached = self
            .cache
            .get(RECIPES_CACHE_KEY)
            .await
            .map_err(ServiceError::backend)?;

        if let Some(snapshot) = cached {
            match serde_json::from_str::<Vec<Recipe>>(&snapshot) {
                Ok(recipes) => {
                    self.metrics.cache_hit();
                    debug!(count = recipes.len(), "Serving recipes from cache");
                    return Ok(recipes);
                }
                Err(err) => {
                    warn!(error = %err, "Discarding unreadable recipe snapshot");
                    self.cache
                        .delete(RECIPES_CACHE_KEY)
                        .await
                        .map_err(ServiceError::backend)?;
                }
            }
        }

        self.metrics.cache_miss();
        let recipes = self.store.find_all().await.map_err(ServiceError::backend)?;

        match serde_json::to_string(&recipes) {
            Ok(snapshot) => {
                if let Err(err) = self.cache.set(RECIPES_CACHE_KEY, &snapshot).await {
                    warn!(error = ?err, "Failed to repopulate recipe cache");
                }
            }
            Err(err) => warn!(error = %err, "Failed to serialize recipe snapshot"),
        }

        Ok(recipes)
    }

    pub async fn create(&self, input: RecipeInput) -> ServiceResult<Recipe> {
        let recipe = Recipe::from_input(input, Uuid::new_v4(), Utc::now());
        self.store
            .insert(&recipe)
            .await
            .map_err(ServiceError::backend)?;
        info!(recipe_id = %recipe.id, "Recipe created");

        self.invalidate().await?;
        Ok(recipe)
    }

    pub async fn update(&self, id: Uuid, input: RecipeInput) -> ServiceResult<Recipe> {
        let updated = self
            .store
            .replace(id, &input)
            .await
            .map_err(ServiceError::backend)?
            .ok_or(ServiceError::NotFound)?;
        info!(recipe_id = %id, "Recipe updated");

        self.invalidate().await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let existed = self
            .store
            .delete_by_id(id)
            .await
            .map_err(ServiceError::backend)?;
        if !existed {
            return Err(ServiceError::NotFound);
        }
        info!(recipe_id = %id, "Recipe deleted");

        self.invalidate().await
    }

    /// Recipes carrying `tag`, compared case-insensitively.
    pub async fn search(&self, tag: &str) -> ServiceResult<Vec<Recipe>> {
        let recipes = self.list().await?;
        Ok(recipes.into_iter().filter(|r| r.has_tag(tag)).collect())
    }

    /// Drops the collection snapshot. Callers must have committed their write first.
    pub async fn invalidate(&self) -> ServiceResult<()> {
        if let Err(err) = self.cache.delete(RECIPES_CACHE_KEY).await {
            error!(error = ?err, "Failed to invalidate recipe cache after write");
            return Err(ServiceError::backend(err));
        }
        self.metrics.cache_invalidated();
        Ok(())
    }
}
