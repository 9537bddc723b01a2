use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::models::category::{Category, CategoryResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("difficulty must be one of easy, medium, hard (got '{}')", other)),
        }
    }
}

/// Denormalized owner snapshot embedded in each recipe. Renaming a user does
/// not rewrite past recipes; `user_id` stays the durable reference.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecipeOwner {
    pub name: String,
    pub user_id: ObjectId,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub preparation_time: f64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub owner: RecipeOwner,
    #[serde(default)]
    pub categories: Vec<ObjectId>,
}

/// Validated field set of a recipe mutation, assembled from the multipart
/// form. On create `categories` holds category NAMES; on update it holds
/// category ids. The two endpoints are deliberately asymmetric.
#[derive(Debug, Default, Validate, utoipa::ToSchema)]
pub struct RecipeForm {
    #[validate(length(min = 1, message = "name is not allowed to be empty"))]
    pub name: String,
    #[validate(range(exclusive_min = 0.0, message = "preparationTime must be a positive number"))]
    pub preparation_time: f64,
    pub difficulty: Option<Difficulty>,
    pub categories: Vec<String>,
    pub is_private: bool,
}

impl RecipeForm {
    /// Boundary validation in one place: derive-checked fields plus the
    /// presence checks the derive cannot express.
    pub fn validated(self) -> Result<Self, crate::utils::error::AppError> {
        if self.difficulty.is_none() {
            return Err(crate::utils::error::AppError::Validation(
                "difficulty is required".to_string(),
            ));
        }
        self.validate()?;
        Ok(self)
    }
}

/// Recipe as embedded in category views: category references stay as ids.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: String,
    pub name: String,
    pub preparation_time: f64,
    pub difficulty: Difficulty,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub owner: OwnerResponse,
    pub categories: Vec<String>,
}

impl From<Recipe> for RecipeSummary {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: recipe.name,
            preparation_time: recipe.preparation_time,
            difficulty: recipe.difficulty,
            is_private: recipe.is_private,
            image_url: recipe.image_url,
            owner: OwnerResponse::from(recipe.owner),
            categories: recipe.categories.iter().map(|id| id.to_hex()).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub name: String,
    pub user_id: String,
}

impl From<RecipeOwner> for OwnerResponse {
    fn from(owner: RecipeOwner) -> Self {
        Self {
            name: owner.name,
            user_id: owner.user_id.to_hex(),
        }
    }
}

/// Recipe as returned by the recipe endpoints, with its categories joined in.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: String,
    pub name: String,
    pub preparation_time: f64,
    pub difficulty: Difficulty,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub owner: OwnerResponse,
    pub categories: Vec<CategoryResponse>,
}

impl RecipeResponse {
    pub fn from_parts(recipe: Recipe, categories: Vec<Category>) -> Self {
        Self {
            id: recipe.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: recipe.name,
            preparation_time: recipe.preparation_time,
            difficulty: recipe.difficulty,
            is_private: recipe.is_private,
            image_url: recipe.image_url,
            owner: OwnerResponse::from(recipe.owner),
            categories: categories.into_iter().map(CategoryResponse::from).collect(),
        }
    }
}
