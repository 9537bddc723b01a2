use actix_web::{web, HttpResponse, ResponseError};

use crate::database::MongoDB;
use crate::models::{CategoryResponse, CategoryWithRecipes};
use crate::services::category_service;
use crate::services::user_service::Claims;

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Categories",
    responses(
        (status = 200, description = "All categories", body = [CategoryResponse])
    )
)]
pub async fn get_all_categories(db: web::Data<MongoDB>) -> HttpResponse {
    match category_service::find_all(&db).await {
        Ok(categories) => HttpResponse::Ok().json(
            categories
                .into_iter()
                .map(CategoryResponse::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/categories/withRecipes",
    tag = "Categories",
    responses(
        (status = 200, description = "All categories with their visible member recipes", body = [CategoryWithRecipes])
    )
)]
pub async fn get_categories_with_recipes(
    user: Option<web::ReqData<Claims>>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match category_service::find_all_with_recipes(&db, user.as_deref()).await {
        Ok(categories) => HttpResponse::Ok().json(categories),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "Categories",
    responses(
        (status = 200, description = "Category with its visible member recipes", body = CategoryWithRecipes),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn get_category_by_id(
    user: Option<web::ReqData<Claims>>,
    path: web::Path<String>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    match category_service::find_by_id_with_recipes(&db, &path, user.as_deref()).await {
        Ok(category) => HttpResponse::Ok().json(category),
        Err(e) => e.error_response(),
    }
}
