use crate::database::MongoDB;
use crate::models::{Category, CategoryWithRecipes, Recipe, RecipeSummary};
use crate::services::recipe_service;
use crate::services::user_service::Claims;
use crate::utils::error::AppError;
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use std::collections::HashMap;

const COLLECTION: &str = "categories";

/// Exact, case-sensitive description lookup.
pub async fn find_by_descriptions(
    db: &MongoDB,
    descriptions: &[String],
) -> Result<Vec<Category>, AppError> {
    if descriptions.is_empty() {
        return Ok(vec![]);
    }

    let collection = db.collection::<Category>(COLLECTION);
    let mut cursor = collection
        .find(doc! { "description": { "$in": descriptions.to_vec() } })
        .await?;

    let mut categories = Vec::new();
    while let Some(result) = cursor.next().await {
        categories.push(result?);
    }
    Ok(categories)
}

/// Inserts one category per description, each seeded with the given recipe
/// references. Descriptions are trimmed before insert.
pub async fn create_many(
    db: &MongoDB,
    descriptions: &[String],
    seed_recipes: &[ObjectId],
) -> Result<Vec<Category>, AppError> {
    if descriptions.is_empty() {
        return Ok(vec![]);
    }

    let categories: Vec<Category> = descriptions
        .iter()
        .map(|description| Category {
            id: Some(ObjectId::new()),
            description: description.trim().to_string(),
            recipes: seed_recipes.to_vec(),
        })
        .collect();

    let collection = db.collection::<Category>(COLLECTION);
    collection.insert_many(&categories).await?;

    Ok(categories)
}

/// Idempotent set-add of a recipe reference. Calling it twice leaves the
/// `recipes` set unchanged after the first application.
pub async fn add_recipe_ref(
    db: &MongoDB,
    category_ids: &[ObjectId],
    recipe_id: ObjectId,
) -> Result<(), AppError> {
    if category_ids.is_empty() {
        return Ok(());
    }

    let collection = db.collection::<Category>(COLLECTION);
    collection
        .update_many(
            doc! { "_id": { "$in": category_ids.to_vec() } },
            doc! { "$addToSet": { "recipes": recipe_id } },
        )
        .await?;
    Ok(())
}

/// Idempotent set-remove of a recipe reference.
pub async fn remove_recipe_ref(
    db: &MongoDB,
    category_ids: &[ObjectId],
    recipe_id: ObjectId,
) -> Result<(), AppError> {
    if category_ids.is_empty() {
        return Ok(());
    }

    let collection = db.collection::<Category>(COLLECTION);
    collection
        .update_many(
            doc! { "_id": { "$in": category_ids.to_vec() } },
            doc! { "$pull": { "recipes": recipe_id } },
        )
        .await?;
    Ok(())
}

pub async fn find_all(db: &MongoDB) -> Result<Vec<Category>, AppError> {
    let collection = db.collection::<Category>(COLLECTION);
    let mut cursor = collection.find(doc! {}).await?;

    let mut categories = Vec::new();
    while let Some(result) = cursor.next().await {
        categories.push(result?);
    }
    Ok(categories)
}

/// All categories with their member recipes joined in, one batched recipe
/// query for the whole listing. The join only surfaces recipes the caller
/// may see.
pub async fn find_all_with_recipes(
    db: &MongoDB,
    caller: Option<&Claims>,
) -> Result<Vec<CategoryWithRecipes>, AppError> {
    let categories = find_all(db).await?;

    let all_ids: Vec<ObjectId> = categories.iter().flat_map(|c| c.recipes.clone()).collect();
    let recipes = resolve_recipes(db, &all_ids, caller).await?;
    let by_id: HashMap<ObjectId, &Recipe> = recipes
        .iter()
        .filter_map(|r| r.id.map(|id| (id, r)))
        .collect();

    Ok(categories
        .into_iter()
        .map(|category| {
            let members = category
                .recipes
                .iter()
                .filter_map(|id| by_id.get(id))
                .map(|&recipe| RecipeSummary::from(recipe.clone()))
                .collect();
            CategoryWithRecipes::from_parts(category, members)
        })
        .collect())
}

pub async fn find_by_id_with_recipes(
    db: &MongoDB,
    id: &str,
    caller: Option<&Claims>,
) -> Result<CategoryWithRecipes, AppError> {
    let object_id = ObjectId::parse_str(id)
        .map_err(|_| AppError::InvalidId("Invalid ID".to_string()))?;

    let collection = db.collection::<Category>(COLLECTION);
    let category = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let recipes = resolve_recipes(db, &category.recipes, caller).await?;
    let members = recipes.into_iter().map(RecipeSummary::from).collect();

    Ok(CategoryWithRecipes::from_parts(category, members))
}

/// Store-level join used by the recipe query service in place of lazy
/// population.
pub async fn resolve_categories(
    db: &MongoDB,
    ids: &[ObjectId],
) -> Result<Vec<Category>, AppError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let collection = db.collection::<Category>(COLLECTION);
    let mut cursor = collection.find(doc! { "_id": { "$in": ids.to_vec() } }).await?;

    let mut categories = Vec::new();
    while let Some(result) = cursor.next().await {
        categories.push(result?);
    }
    Ok(categories)
}

/// Store-level join from category-side recipe references to recipe
/// documents, visibility-filtered for the caller.
pub async fn resolve_recipes(
    db: &MongoDB,
    ids: &[ObjectId],
    caller: Option<&Claims>,
) -> Result<Vec<Recipe>, AppError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let filter = doc! {
        "_id": { "$in": ids.to_vec() },
        "$or": recipe_service::visibility_branches(caller),
    };

    let collection = db.collection::<Recipe>("recipes");
    let mut cursor = collection.find(filter).await?;

    let mut recipes = Vec::new();
    while let Some(result) = cursor.next().await {
        recipes.push(result?);
    }
    Ok(recipes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_add_recipe_ref_is_idempotent() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/recipes-test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();

        let created = create_many(&db, &[format!("Idempotence-{}", ObjectId::new().to_hex())], &[])
            .await
            .unwrap();
        let category_id = created[0].id.unwrap();
        let recipe_id = ObjectId::new();

        add_recipe_ref(&db, &[category_id], recipe_id).await.unwrap();
        add_recipe_ref(&db, &[category_id], recipe_id).await.unwrap();

        let category = db
            .collection::<Category>(COLLECTION)
            .find_one(doc! { "_id": category_id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(category.recipes, vec![recipe_id]);

        remove_recipe_ref(&db, &[category_id], recipe_id).await.unwrap();
        remove_recipe_ref(&db, &[category_id], recipe_id).await.unwrap();

        let category = db
            .collection::<Category>(COLLECTION)
            .find_one(doc! { "_id": category_id })
            .await
            .unwrap()
            .unwrap();
        assert!(category.recipes.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_find_by_descriptions_is_case_sensitive() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/recipes-test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();

        let marker = ObjectId::new().to_hex();
        let name = format!("Dessert-{}", marker);
        create_many(&db, &[name.clone()], &[]).await.unwrap();

        let exact = find_by_descriptions(&db, &[name.clone()]).await.unwrap();
        assert_eq!(exact.len(), 1);

        let lowered = find_by_descriptions(&db, &[name.to_lowercase()]).await.unwrap();
        assert!(lowered.is_empty());
    }
}
