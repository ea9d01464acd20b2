use axum::extract::{Path, Query, State};
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Recipe, RecipeInput};
use crate::repository::RecipeRepository;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn parse_recipe_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("invalid_recipe_id"))
}

fn validated(input: RecipeInput) -> ApiResult<RecipeInput> {
    if input.is_valid() {
        Ok(input)
    } else {
        Err(ApiError::BadRequest {
            code: "invalid_recipe",
            message: Some("Recipe name is required".to_string()),
        })
    }
}

pub async fn list_recipes(State(repo): State<RecipeRepository>) -> ApiResult<Json<Vec<Recipe>>> {
    Ok(Json(repo.list().await?))
}

pub async fn search_recipes(
    State(repo): State<RecipeRepository>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Recipe>>> {
    let tag = params
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_tag"))?;
    Ok(Json(repo.search(tag).await?))
}

pub async fn create_recipe(
    State(repo): State<RecipeRepository>,
    Json(input): Json<RecipeInput>,
) -> ApiResult<Json<Recipe>> {
    let input = validated(input)?;
    Ok(Json(repo.create(input).await?))
}

pub async fn update_recipe(
    State(repo): State<RecipeRepository>,
    Path(id): Path<String>,
    Json(input): Json<RecipeInput>,
) -> ApiResult<Json<Recipe>> {
    let id = parse_recipe_id(&id)?;
    let input = validated(input)?;
    Ok(Json(repo.update(id, input).await?))
}

pub async fn delete_recipe(
    State(repo): State<RecipeRepository>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_recipe_id(&id)?;
    repo.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Recipe has been deleted",
    }))
}
