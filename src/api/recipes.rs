use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, ResponseError};
use futures::StreamExt;

use crate::database::MongoDB;
use crate::models::{RecipeForm, RecipeResponse};
use crate::services::recipe_service::{self, RecipeListQuery};
use crate::services::user_service::Claims;
use crate::utils::error::AppError;
use crate::utils::upload;

async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::Validation(format!("Failed to read field: {}", e)))?;
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes)
        .map_err(|_| AppError::Validation("Form fields must be valid UTF-8".to_string()))
}

/// Assembles the recipe field set from a multipart payload. The optional
/// `image` part is persisted as a side effect; repeated `categories` parts
/// accumulate. Unknown parts are ignored, like unknown body keys in a JSON
/// endpoint.
async fn parse_recipe_form(
    mut payload: Multipart,
) -> Result<(RecipeForm, Option<String>), AppError> {
    let mut form = RecipeForm::default();
    let mut image: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = item
            .map_err(|e| AppError::Validation(format!("Malformed multipart payload: {}", e)))?;
        let name = field.name().to_string();

        if name == "image" {
            image = Some(upload::save_image(&mut field).await?);
            continue;
        }

        let value = read_text(&mut field).await?;
        match name.as_str() {
            "name" => form.name = value,
            "preparationTime" => {
                form.preparation_time = value.parse().map_err(|_| {
                    AppError::Validation("preparationTime must be a positive number".to_string())
                })?;
            }
            "difficulty" => form.difficulty = Some(value.parse().map_err(AppError::Validation)?),
            "isPrivate" => {
                form.is_private = value.parse().map_err(|_| {
                    AppError::Validation("isPrivate must be a boolean".to_string())
                })?;
            }
            "categories" => form.categories.push(value),
            _ => {}
        }
    }

    Ok((form, image))
}

#[utoipa::path(
    get,
    path = "/api/recipes",
    tag = "Recipes",
    params(RecipeListQuery),
    responses(
        (status = 200, description = "Visibility-filtered, paginated recipes", body = [RecipeResponse])
    )
)]
pub async fn get_all_recipes(
    user: Option<web::ReqData<Claims>>,
    query: web::Query<RecipeListQuery>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match recipe_service::find_visible(&db, user.as_deref(), &query).await {
        Ok(recipes) => HttpResponse::Ok().json(recipes),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    responses(
        (status = 200, description = "Recipe with its categories", body = RecipeResponse),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Unknown id, or private recipe of another user")
    )
)]
pub async fn get_recipe_by_id(
    user: Option<web::ReqData<Claims>>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match recipe_service::find_by_id(&db, &path, user.as_deref()).await {
        Ok(recipe) => HttpResponse::Ok().json(recipe),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/recipes/byUser/{userId}",
    tag = "Recipes",
    responses(
        (status = 200, description = "A user's visible recipes", body = [RecipeResponse]),
        (status = 400, description = "Malformed user id")
    )
)]
pub async fn get_recipes_by_user(
    user: Option<web::ReqData<Claims>>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match recipe_service::find_by_user(&db, &path, user.as_deref()).await {
        Ok(recipes) => HttpResponse::Ok().json(recipes),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/recipes/byPreparationTime/{minutes}",
    tag = "Recipes",
    responses(
        (status = 200, description = "Visible recipes prepared within the bound", body = [RecipeResponse]),
        (status = 400, description = "Non-positive bound")
    )
)]
pub async fn get_recipes_by_preparation_time(
    user: Option<web::ReqData<Claims>>,
    path: web::Path<f64>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match recipe_service::find_by_max_preparation_time(&db, *path, user.as_deref()).await {
        Ok(recipes) => HttpResponse::Ok().json(recipes),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    tag = "Recipes",
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Role may not create recipes")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_recipe(
    user: web::ReqData<Claims>,
    payload: Multipart,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    log::info!("🍲 POST /api/recipes - user: {}", user.username);

    let (form, image) = match parse_recipe_form(payload).await {
        Ok(parsed) => parsed,
        Err(e) => return e.error_response(),
    };

    match recipe_service::create_recipe(&db, &user, form, image).await {
        Ok(recipe) => HttpResponse::Created().json(recipe),
        Err(e) => {
            log::warn!("❌ Recipe creation failed: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Validation failure or malformed id"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Role may not update recipes"),
        (status = 404, description = "Unknown recipe")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_recipe(
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: Multipart,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    log::info!("✏️ PUT /api/recipes/{} - user: {}", path, user.username);

    let (form, image) = match parse_recipe_form(payload).await {
        Ok(parsed) => parsed,
        Err(e) => return e.error_response(),
    };

    match recipe_service::update_recipe(&db, &path, form, image).await {
        Ok(recipe) => HttpResponse::Ok().json(recipe),
        Err(e) => {
            log::warn!("❌ Recipe update failed: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Role may not delete recipes"),
        (status = 404, description = "Unknown recipe")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_recipe(
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    log::info!("🗑️ DELETE /api/recipes/{} - user: {}", path, user.username);

    match recipe_service::delete_recipe(&db, &path).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.error_response(),
    }
}
