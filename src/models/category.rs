use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::recipe::RecipeSummary;

/// Category document. `recipes` is the category-side half of the
/// recipe/category relationship and is only ever touched through
/// idempotent $addToSet / $pull updates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub description: String,
    #[serde(default)]
    pub recipes: Vec<ObjectId>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryResponse {
    pub id: String,
    pub description: String,
    pub recipes: Vec<String>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id.map(|id| id.to_hex()).unwrap_or_default(),
            description: category.description,
            recipes: category.recipes.iter().map(|id| id.to_hex()).collect(),
        }
    }
}

/// Category with its member recipes joined in (GET /api/categories/withRecipes
/// and GET /api/categories/{id}). The join is visibility-filtered, so a
/// category never exposes another user's private recipes.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryWithRecipes {
    pub id: String,
    pub description: String,
    pub recipes: Vec<RecipeSummary>,
}

impl CategoryWithRecipes {
    pub fn from_parts(category: Category, recipes: Vec<RecipeSummary>) -> Self {
        Self {
            id: category.id.map(|id| id.to_hex()).unwrap_or_default(),
            description: category.description,
            recipes,
        }
    }
}
