use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted recipe. `id` and `published_at` are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
}

impl Recipe {
    pub fn from_input(input: RecipeInput, id: Uuid, published_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            ingredients: input.ingredients,
            instructions: input.instructions,
            tags: input.tags,
            published_at,
        }
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.trim().to_lowercase() == wanted)
    }

    pub fn apply(&mut self, input: &RecipeInput) {
        self.name = input.name.clone();
        self.ingredients = input.ingredients.clone();
        self.instructions = input.instructions.clone();
        self.tags = input.tags.clone();
    }
}

/// The mutable fields of a recipe as accepted by create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeInput {
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RecipeInput {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}
