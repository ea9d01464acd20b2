use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Recipe, RecipeInput};

/// Durable recipe storage. Query execution is opaque to callers.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Recipe>>;
    async fn insert(&self, recipe: &Recipe) -> Result<()>;
    /// Replaces the mutable fields; `None` when no such recipe exists.
    async fn replace(&self, id: Uuid, input: &RecipeInput) -> Result<Option<Recipe>>;
    /// Returns whether a row was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;
}

// ---------------- Postgres Implementation ----------------

#[derive(Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn find_all(&self) -> Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(
            "SELECT id, name, ingredients, instructions, tags, published_at FROM recipes ORDER BY published_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recipes")?;
        Ok(rows)
    }

    async fn insert(&self, recipe: &Recipe) -> Result<()> {
        sqlx::query(
            "INSERT INTO recipes (id, name, ingredients, instructions, tags, published_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.ingredients)
        .bind(&recipe.instructions)
        .bind(&recipe.tags)
        .bind(recipe.published_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert recipe")?;
        Ok(())
    }

    async fn replace(&self, id: Uuid, input: &RecipeInput) -> Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(
            "UPDATE recipes SET name = $2, ingredients = $3, instructions = $4, tags = $5 \
             WHERE id = $1 \
             RETURNING id, name, ingredients, instructions, tags, published_at",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.ingredients)
        .bind(&input.instructions)
        .bind(&input.tags)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update recipe {id}"))?;
        Ok(row)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete recipe {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------- In-Memory Implementation (Tests) ----------------

/// Insertion-ordered store that counts `find_all` calls and can be made to fail.
#[derive(Clone, Default)]
pub struct InMemoryRecipeStore {
    rows: Arc<Mutex<Vec<Recipe>>>,
    find_all_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_all_count(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("store connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn find_all(&self) -> Result<Vec<Recipe>> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows.lock().await.clone())
    }

    async fn insert(&self, recipe: &Recipe) -> Result<()> {
        self.check_available()?;
        self.rows.lock().await.push(recipe.clone());
        Ok(())
    }

    async fn replace(&self, id: Uuid, input: &RecipeInput) -> Result<Option<Recipe>> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        Ok(rows.iter_mut().find(|r| r.id == id).map(|recipe| {
            recipe.apply(input);
            recipe.clone()
        }))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }
}
