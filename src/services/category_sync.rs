//! Keeps the two halves of the recipe/category relationship consistent:
//! a recipe's `categories` field and each category's `recipes` set.
//!
//! Reconciliation is multi-step and NOT wrapped in a cross-document
//! transaction. A failure between steps leaves partial state and surfaces
//! as a 500 on the triggering request; the individual steps are idempotent
//! $addToSet / $pull updates, so a retried request converges.

use crate::database::MongoDB;
use crate::models::Recipe;
use crate::services::category_service;
use crate::utils::error::AppError;
use mongodb::bson::{doc, oid::ObjectId};
use std::collections::HashSet;

/// Categories a recipe update must be pulled from: previous set minus the
/// desired set. Additions are simply the whole desired set, the $addToSet
/// primitive makes re-adding members of the intersection a no-op.
pub fn removed_categories(old: &[ObjectId], new: &[ObjectId]) -> Vec<ObjectId> {
    let keep: HashSet<&ObjectId> = new.iter().collect();
    old.iter().filter(|id| !keep.contains(id)).copied().collect()
}

/// Create-side attachment, two-phase because category identity is name-keyed
/// while recipe storage is id-keyed:
///
/// 1. existing categories matching the requested names get the recipe id;
/// 2. names with no category are inserted, seeded with the recipe id;
/// 3. the full name set is re-resolved to ids and written onto the
///    recipe's `categories` field, replacing any prior value.
///
/// Returns the resolved category ids.
pub async fn attach_categories(
    db: &MongoDB,
    recipe_id: ObjectId,
    names: &[String],
) -> Result<Vec<ObjectId>, AppError> {
    let names: Vec<String> = names
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(vec![]);
    }

    let existing = category_service::find_by_descriptions(db, &names).await?;
    let existing_ids: Vec<ObjectId> = existing.iter().filter_map(|c| c.id).collect();
    category_service::add_recipe_ref(db, &existing_ids, recipe_id).await?;

    let existing_names: HashSet<&str> = existing.iter().map(|c| c.description.as_str()).collect();
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !existing_names.contains(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        category_service::create_many(db, &missing, &[recipe_id]).await?;
        log::info!("🏷️ Created {} new categories", missing.len());
    }

    // Only now does every requested name have a durable id
    let resolved = category_service::find_by_descriptions(db, &names).await?;
    let ids: Vec<ObjectId> = resolved.iter().filter_map(|c| c.id).collect();

    let recipes = db.collection::<Recipe>("recipes");
    recipes
        .update_one(
            doc! { "_id": recipe_id },
            doc! { "$set": { "categories": ids.clone() } },
        )
        .await?;

    Ok(ids)
}

/// Update-side reconciliation between the stored category set and the
/// desired one. No categories are created here: updates speak ids, not
/// names.
pub async fn reconcile_categories(
    db: &MongoDB,
    recipe_id: ObjectId,
    old: &[ObjectId],
    new: &[ObjectId],
) -> Result<(), AppError> {
    let to_remove = removed_categories(old, new);
    category_service::remove_recipe_ref(db, &to_remove, recipe_id).await?;
    category_service::add_recipe_ref(db, new, recipe_id).await?;
    Ok(())
}

/// Delete-side cleanup: pull the recipe id from every category whose
/// `recipes` set contains it, regardless of what the recipe's own
/// `categories` field claims. Tolerates prior desync.
pub async fn detach_recipe(db: &MongoDB, recipe_id: ObjectId) -> Result<(), AppError> {
    let categories = db.collection::<crate::models::Category>("categories");
    categories
        .update_many(
            doc! { "recipes": recipe_id },
            doc! { "$pull": { "recipes": recipe_id } },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Difficulty, RecipeOwner};

    fn ids(n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| ObjectId::new()).collect()
    }

    #[test]
    fn test_removed_categories_is_set_difference() {
        let old = ids(3);
        let new = vec![old[0], old[2], ObjectId::new()];
        let removed = removed_categories(&old, &new);
        assert_eq!(removed, vec![old[1]]);
    }

    #[test]
    fn test_removed_categories_empty_new_removes_all() {
        let old = ids(2);
        assert_eq!(removed_categories(&old, &[]), old);
    }

    #[test]
    fn test_removed_categories_disjoint_sets() {
        let old = ids(2);
        let new = ids(2);
        assert_eq!(removed_categories(&old, &new), old);
        assert!(removed_categories(&[], &new).is_empty());
    }

    async fn test_db() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/recipes-test".to_string());
        MongoDB::new(&uri).await.unwrap()
    }

    fn sample_recipe(name: &str) -> Recipe {
        Recipe {
            id: Some(ObjectId::new()),
            name: name.to_string(),
            preparation_time: 25.0,
            difficulty: Difficulty::Easy,
            is_private: false,
            image_url: None,
            owner: RecipeOwner {
                name: "chef".to_string(),
                user_id: ObjectId::new(),
            },
            categories: vec![],
        }
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_attach_seeds_missing_and_updates_existing() {
        let db = test_db().await;
        let marker = ObjectId::new().to_hex();
        let dessert = format!("Dessert-{}", marker);
        let new_cat = format!("NewCat-{}", marker);

        category_service::create_many(&db, &[dessert.clone()], &[]).await.unwrap();

        let recipe = sample_recipe("Basbousa");
        let recipe_id = recipe.id.unwrap();
        db.collection::<Recipe>("recipes").insert_one(&recipe).await.unwrap();

        let resolved = attach_categories(&db, recipe_id, &[dessert.clone(), new_cat.clone()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);

        // Both categories now reference the recipe
        for name in [&dessert, &new_cat] {
            let category = db
                .collection::<Category>("categories")
                .find_one(doc! { "description": name })
                .await
                .unwrap()
                .unwrap();
            assert!(category.recipes.contains(&recipe_id), "{} missing ref", name);
        }

        // And the recipe's own field holds the resolved ids
        let stored = db
            .collection::<Recipe>("recipes")
            .find_one(doc! { "_id": recipe_id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.categories.len(), 2);
        for id in &resolved {
            assert!(stored.categories.contains(id));
        }
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_reconcile_moves_refs_between_categories() {
        let db = test_db().await;
        let marker = ObjectId::new().to_hex();
        let created = category_service::create_many(
            &db,
            &[format!("Dessert-{}", marker), format!("Lunch-{}", marker)],
            &[],
        )
        .await
        .unwrap();
        let dessert_id = created[0].id.unwrap();
        let lunch_id = created[1].id.unwrap();

        let recipe_id = ObjectId::new();
        category_service::add_recipe_ref(&db, &[dessert_id], recipe_id).await.unwrap();

        reconcile_categories(&db, recipe_id, &[dessert_id], &[lunch_id]).await.unwrap();

        let dessert = db
            .collection::<Category>("categories")
            .find_one(doc! { "_id": dessert_id })
            .await
            .unwrap()
            .unwrap();
        assert!(!dessert.recipes.contains(&recipe_id));

        let lunch = db
            .collection::<Category>("categories")
            .find_one(doc! { "_id": lunch_id })
            .await
            .unwrap()
            .unwrap();
        assert!(lunch.recipes.contains(&recipe_id));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_detach_sweeps_stale_references() {
        let db = test_db().await;
        let marker = ObjectId::new().to_hex();
        let recipe_id = ObjectId::new();

        // Category references the recipe even though no recipe document
        // claims the category: stale by construction
        let created = category_service::create_many(
            &db,
            &[format!("Stale-{}", marker)],
            &[recipe_id],
        )
        .await
        .unwrap();
        let category_id = created[0].id.unwrap();

        detach_recipe(&db, recipe_id).await.unwrap();

        let category = db
            .collection::<Category>("categories")
            .find_one(doc! { "_id": category_id })
            .await
            .unwrap()
            .unwrap();
        assert!(!category.recipes.contains(&recipe_id));
    }
}
