use crate::database::MongoDB;
use crate::models::{Category, Recipe, RecipeForm, RecipeOwner, RecipeResponse};
use crate::services::user_service::{self, Claims};
use crate::services::{category_service, category_sync};
use crate::utils::error::AppError;
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use std::collections::HashMap;

const COLLECTION: &str = "recipes";

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RecipeListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Visibility predicate as $or branches: everything public, plus the
/// caller's own private recipes when authenticated.
pub(crate) fn visibility_branches(caller: Option<&Claims>) -> Vec<Document> {
    let mut branches = vec![doc! { "isPrivate": false }];
    if let Some(claims) = caller {
        if let Ok(user_id) = ObjectId::parse_str(&claims.sub) {
            branches.push(doc! { "owner.userId": user_id, "isPrivate": true });
        }
    }
    branches
}

/// Search is ANDed into each visibility branch:
/// (public ∧ name~search) ∪ (own-private ∧ name~search).
pub(crate) fn visibility_filter(search: &str, caller: Option<&Claims>) -> Document {
    let name_match = doc! { "$regex": search, "$options": "i" };
    let branches: Vec<Document> = visibility_branches(caller)
        .into_iter()
        .map(|mut branch| {
            branch.insert("name", name_match.clone());
            branch
        })
        .collect();
    doc! { "$or": branches }
}

/// skip/limit window over natural insertion order. Non-positive or missing
/// values fall back to page 1, ten per page.
pub(crate) fn pagination_window(page: Option<i64>, per_page: Option<i64>) -> (u64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let per_page = per_page.filter(|p| *p > 0).unwrap_or(10);
    (((page - 1) * per_page) as u64, per_page)
}

async fn drain(mut cursor: mongodb::Cursor<Recipe>) -> Result<Vec<Recipe>, AppError> {
    let mut recipes = Vec::new();
    while let Some(result) = cursor.next().await {
        recipes.push(result?);
    }
    Ok(recipes)
}

/// Batched category join for a page of recipes; one store query regardless
/// of page size.
async fn with_categories(
    db: &MongoDB,
    recipes: Vec<Recipe>,
) -> Result<Vec<RecipeResponse>, AppError> {
    let all_ids: Vec<ObjectId> = recipes.iter().flat_map(|r| r.categories.clone()).collect();
    let categories = category_service::resolve_categories(db, &all_ids).await?;
    let by_id: HashMap<ObjectId, Category> = categories
        .into_iter()
        .filter_map(|c| c.id.map(|id| (id, c)))
        .collect();

    Ok(recipes
        .into_iter()
        .map(|recipe| {
            let resolved = recipe
                .categories
                .iter()
                .filter_map(|id| by_id.get(id).cloned())
                .collect();
            RecipeResponse::from_parts(recipe, resolved)
        })
        .collect())
}

/// Visibility-filtered, paginated recipe listing. Requesting past the last
/// page yields an empty sequence.
pub async fn find_visible(
    db: &MongoDB,
    caller: Option<&Claims>,
    query: &RecipeListQuery,
) -> Result<Vec<RecipeResponse>, AppError> {
    let search = query.search.as_deref().unwrap_or("");
    let filter = visibility_filter(search, caller);
    let (skip, limit) = pagination_window(query.page, query.per_page);

    let collection = db.collection::<Recipe>(COLLECTION);
    let cursor = collection.find(filter).skip(skip).limit(limit).await?;
    let recipes = drain(cursor).await?;

    with_categories(db, recipes).await
}

/// Single recipe by id. A private recipe is indistinguishable from a
/// missing one for anybody but its owner.
pub async fn find_by_id(
    db: &MongoDB,
    id: &str,
    caller: Option<&Claims>,
) -> Result<RecipeResponse, AppError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;

    let collection = db.collection::<Recipe>(COLLECTION);
    let recipe = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

    if recipe.is_private && !is_owner(&recipe, caller) {
        return Err(AppError::NotFound("Recipe not found".to_string()));
    }

    let categories = category_service::resolve_categories(db, &recipe.categories).await?;
    Ok(RecipeResponse::from_parts(recipe, categories))
}

fn is_owner(recipe: &Recipe, caller: Option<&Claims>) -> bool {
    caller
        .map(|claims| recipe.owner.user_id.to_hex() == claims.sub)
        .unwrap_or(false)
}

/// A user's recipes, visibility-filtered: everyone sees the public ones,
/// only the owner also sees the private ones.
pub async fn find_by_user(
    db: &MongoDB,
    user_id: &str,
    caller: Option<&Claims>,
) -> Result<Vec<RecipeResponse>, AppError> {
    let owner_id = ObjectId::parse_str(user_id)
        .map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;

    let filter = doc! {
        "owner.userId": owner_id,
        "$or": visibility_branches(caller),
    };

    let collection = db.collection::<Recipe>(COLLECTION);
    let recipes = drain(collection.find(filter).await?).await?;
    with_categories(db, recipes).await
}

/// Recipes prepared within the given time bound, visibility-filtered.
pub async fn find_by_max_preparation_time(
    db: &MongoDB,
    minutes: f64,
    caller: Option<&Claims>,
) -> Result<Vec<RecipeResponse>, AppError> {
    if minutes <= 0.0 {
        return Err(AppError::Validation(
            "preparationTime must be a positive number".to_string(),
        ));
    }

    let filter = doc! {
        "preparationTime": { "$lte": minutes },
        "$or": visibility_branches(caller),
    };

    let collection = db.collection::<Recipe>(COLLECTION);
    let recipes = drain(collection.find(filter).await?).await?;
    with_categories(db, recipes).await
}

/// Creates the recipe, then hands the requested category NAMES to the
/// synchronizer; the recipe document ends up carrying the resolved ids.
pub async fn create_recipe(
    db: &MongoDB,
    claims: &Claims,
    form: RecipeForm,
    image: Option<String>,
) -> Result<RecipeResponse, AppError> {
    let form = form.validated()?;
    let difficulty = form
        .difficulty
        .ok_or_else(|| AppError::Validation("difficulty is required".to_string()))?;

    let owner_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;
    let user = user_service::find_by_id(db, &owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let recipe_id = ObjectId::new();
    let mut recipe = Recipe {
        id: Some(recipe_id),
        name: form.name.clone(),
        preparation_time: form.preparation_time,
        difficulty,
        is_private: form.is_private,
        image_url: image,
        owner: RecipeOwner {
            name: user.username,
            user_id: owner_id,
        },
        categories: vec![],
    };

    let collection = db.collection::<Recipe>(COLLECTION);
    collection.insert_one(&recipe).await?;

    if !form.categories.is_empty() {
        recipe.categories = category_sync::attach_categories(db, recipe_id, &form.categories).await?;
    }

    log::info!("🍲 Recipe created: {} ({})", recipe.name, recipe_id.to_hex());

    let categories = category_service::resolve_categories(db, &recipe.categories).await?;
    Ok(RecipeResponse::from_parts(recipe, categories))
}

/// Full-field update. `form.categories` holds category IDS here; updates
/// never create categories, unlike create which takes names.
pub async fn update_recipe(
    db: &MongoDB,
    id: &str,
    form: RecipeForm,
    image: Option<String>,
) -> Result<RecipeResponse, AppError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;
    let form = form.validated()?;
    let difficulty = form
        .difficulty
        .ok_or_else(|| AppError::Validation("difficulty is required".to_string()))?;

    let new_categories: Vec<ObjectId> = form
        .categories
        .iter()
        .map(|raw| {
            ObjectId::parse_str(raw.trim())
                .map_err(|_| AppError::InvalidId("Invalid category ID".to_string()))
        })
        .collect::<Result<_, _>>()?;

    let collection = db.collection::<Recipe>(COLLECTION);
    let previous = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

    let mut update = doc! {
        "name": &form.name,
        "preparationTime": form.preparation_time,
        "difficulty": mongodb::bson::to_bson(&difficulty)
            .map_err(|e| AppError::Database(format!("Serialization error: {}", e)))?,
        "isPrivate": form.is_private,
        "categories": new_categories.clone(),
    };
    if let Some(filename) = image {
        update.insert("imageUrl", filename);
    }

    let updated = collection
        .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": update })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

    category_sync::reconcile_categories(db, object_id, &previous.categories, &new_categories)
        .await?;

    let categories = category_service::resolve_categories(db, &updated.categories).await?;
    Ok(RecipeResponse::from_parts(updated, categories))
}

/// Deletes the recipe after sweeping its id out of every category that
/// references it, stale references included.
pub async fn delete_recipe(db: &MongoDB, id: &str) -> Result<(), AppError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;

    let collection = db.collection::<Recipe>(COLLECTION);
    let recipe = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

    category_sync::detach_recipe(db, object_id).await?;
    collection.delete_one(doc! { "_id": object_id }).await?;

    log::info!("🗑️ Recipe deleted: {} ({})", recipe.name, object_id.to_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn claims_for(user_id: &ObjectId) -> Claims {
        Claims {
            sub: user_id.to_hex(),
            username: "chef".to_string(),
            role: Role::Registered,
            iat: 0,
            exp: usize::MAX,
            jti: "test".to_string(),
        }
    }

    #[test]
    fn test_pagination_window_defaults() {
        assert_eq!(pagination_window(None, None), (0, 10));
        assert_eq!(pagination_window(Some(2), Some(10)), (10, 10));
        assert_eq!(pagination_window(Some(3), Some(5)), (10, 5));
    }

    #[test]
    fn test_pagination_window_coerces_non_positive() {
        assert_eq!(pagination_window(Some(0), Some(-5)), (0, 10));
        assert_eq!(pagination_window(Some(-1), None), (0, 10));
    }

    #[test]
    fn test_anonymous_filter_has_single_public_branch() {
        let filter = visibility_filter("soup", None);
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 1);
        let public = branches[0].as_document().unwrap();
        assert_eq!(public.get_bool("isPrivate").unwrap(), false);
        let name = public.get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), "soup");
        assert_eq!(name.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_authenticated_filter_adds_own_private_branch() {
        let user_id = ObjectId::new();
        let claims = claims_for(&user_id);
        let filter = visibility_filter("", Some(&claims));
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);

        let private = branches[1].as_document().unwrap();
        assert_eq!(private.get_bool("isPrivate").unwrap(), true);
        assert_eq!(private.get_object_id("owner.userId").unwrap(), user_id);
        // Search applies to the private branch too
        assert!(private.get_document("name").is_ok());
    }

    #[test]
    fn test_filter_ignores_malformed_caller_id() {
        let claims = Claims {
            sub: "not-an-object-id".to_string(),
            username: "x".to_string(),
            role: Role::Registered,
            iat: 0,
            exp: usize::MAX,
            jti: "test".to_string(),
        };
        let filter = visibility_filter("", Some(&claims));
        assert_eq!(filter.get_array("$or").unwrap().len(), 1);
    }

    async fn test_db() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/recipes-test".to_string());
        MongoDB::new(&uri).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_private_recipes_hidden_from_non_owners() {
        let db = test_db().await;
        let owner_id = ObjectId::new();
        let marker = ObjectId::new().to_hex();

        let recipe = Recipe {
            id: Some(ObjectId::new()),
            name: format!("Secret-{}", marker),
            preparation_time: 15.0,
            difficulty: crate::models::Difficulty::Easy,
            is_private: true,
            image_url: None,
            owner: RecipeOwner {
                name: "chef".to_string(),
                user_id: owner_id,
            },
            categories: vec![],
        };
        db.collection::<Recipe>(COLLECTION).insert_one(&recipe).await.unwrap();
        let recipe_id = recipe.id.unwrap().to_hex();

        // Anonymous detail read must not leak
        let anonymous = find_by_id(&db, &recipe_id, None).await;
        assert!(matches!(anonymous, Err(AppError::NotFound(_))));

        // Another authenticated user must not leak either
        let stranger = claims_for(&ObjectId::new());
        let other = find_by_id(&db, &recipe_id, Some(&stranger)).await;
        assert!(matches!(other, Err(AppError::NotFound(_))));

        // The owner sees it
        let owner = claims_for(&owner_id);
        let own = find_by_id(&db, &recipe_id, Some(&owner)).await.unwrap();
        assert_eq!(own.id, recipe_id);

        // List reads omit it for strangers, include it for the owner
        let query = RecipeListQuery {
            search: Some(format!("Secret-{}", marker)),
            page: None,
            per_page: None,
        };
        let hidden = find_visible(&db, Some(&stranger), &query).await.unwrap();
        assert!(hidden.is_empty());
        let listed = find_visible(&db, Some(&owner), &query).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_pagination_returns_window_in_insertion_order() {
        let db = test_db().await;
        let marker = ObjectId::new().to_hex();
        let owner = RecipeOwner {
            name: "chef".to_string(),
            user_id: ObjectId::new(),
        };

        for i in 0..25 {
            let recipe = Recipe {
                id: Some(ObjectId::new()),
                name: format!("Page-{}-{:02}", marker, i),
                preparation_time: 10.0,
                difficulty: crate::models::Difficulty::Easy,
                is_private: false,
                image_url: None,
                owner: owner.clone(),
                categories: vec![],
            };
            db.collection::<Recipe>(COLLECTION).insert_one(&recipe).await.unwrap();
        }

        let page2 = find_visible(
            &db,
            None,
            &RecipeListQuery {
                search: Some(format!("Page-{}", marker)),
                page: Some(2),
                per_page: Some(10),
            },
        )
        .await
        .unwrap();
        assert_eq!(page2.len(), 10);
        assert_eq!(page2[0].name, format!("Page-{}-10", marker));
        assert_eq!(page2[9].name, format!("Page-{}-19", marker));

        // Beyond the last page: empty, not an error
        let page9 = find_visible(
            &db,
            None,
            &RecipeListQuery {
                search: Some(format!("Page-{}", marker)),
                page: Some(9),
                per_page: Some(10),
            },
        )
        .await
        .unwrap();
        assert!(page9.is_empty());
    }
}
