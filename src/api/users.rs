use actix_web::{web, HttpResponse, ResponseError};

use crate::database::MongoDB;
use crate::services::user_service::{self, AuthResponse, SigninRequest, SignupRequest};

#[utoipa::path(
    post,
    path = "/api/users/signup",
    tag = "Users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    db: web::Data<MongoDB>,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!("📝 POST /api/users/signup - email: {}", request.email);

    match user_service::signup(&db, &request).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => {
            log::warn!("❌ Signup failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/users/signin",
    tag = "Users",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signin successful", body = AuthResponse),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn signin(
    db: web::Data<MongoDB>,
    request: web::Json<SigninRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /api/users/signin - email: {}", request.email);

    match user_service::signin(&db, &request).await {
        Ok(response) => {
            log::info!("✅ Signin successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Signin failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "All users, without password material", body = [crate::models::PublicUser])
    )
)]
pub async fn get_all_users(db: web::Data<MongoDB>) -> HttpResponse {
    match user_service::list_users(&db).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => e.error_response(),
    }
}
