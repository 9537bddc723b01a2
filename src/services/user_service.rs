use crate::database::MongoDB;
use crate::models::{PublicUser, Role, User};
use crate::utils::error::AppError;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures::stream::StreamExt;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const COLLECTION: &str = "users";

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id (hex)
    pub username: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 3, message = "username length must be at least 3 characters long"))]
    pub username: String,
    #[validate(email(message = "email must be a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password length must be at least 6 characters long"))]
    pub password: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct SigninRequest {
    #[validate(email(message = "email must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub id: String,
    pub username: String,
    pub token: String,
}

fn get_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "JWT_SECRET".to_string())
}

// Generate JWT token (7 day expiry)
pub fn generate_token(user: &User) -> Result<String, AppError> {
    let iat = Utc::now().timestamp() as usize;
    let exp = (Utc::now() + Duration::days(7)).timestamp() as usize;

    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        username: user.username.clone(),
        role: user.role,
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_jwt_secret().as_ref()),
    )
    .map_err(|e| AppError::Database(format!("Failed to generate token: {}", e)))
}

// Verify JWT token. Signature/expiry problems are an authentication
// failure; a well-signed token whose claims fall outside the closed role
// set is a permission failure.
pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    let data = decode::<serde_json::Value>(
        token,
        &DecodingKey::from_secret(get_jwt_secret().as_ref()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    serde_json::from_value(data.claims)
        .map_err(|_| AppError::Forbidden("no permission to invoke this function".to_string()))
}

pub async fn find_by_email(db: &MongoDB, email: &str) -> Result<Option<User>, AppError> {
    let collection = db.collection::<User>(COLLECTION);
    Ok(collection.find_one(doc! { "email": email }).await?)
}

// User signup
pub async fn signup(db: &MongoDB, request: &SignupRequest) -> Result<AuthResponse, AppError> {
    request.validate()?;

    let collection = db.collection::<User>(COLLECTION);

    // Duplicate check before insert; not atomic against races, the unique
    // index on email is the backstop
    if find_by_email(db, &request.email).await?.is_some() {
        return Err(AppError::Duplicate("User already exists".to_string()));
    }

    let hashed_password = hash(&request.password, DEFAULT_COST)
        .map_err(|e| AppError::Database(format!("Failed to hash password: {}", e)))?;

    let user = User {
        id: Some(ObjectId::new()),
        username: request.username.clone(),
        email: request.email.clone(),
        password: hashed_password,
        role: Role::Registered,
        address: request.address.clone(),
    };

    collection.insert_one(&user).await?;

    let token = generate_token(&user)?;

    log::info!("✅ User registered: {}", user.email);

    Ok(AuthResponse {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        username: user.username,
        token,
    })
}

// User signin
pub async fn signin(db: &MongoDB, request: &SigninRequest) -> Result<AuthResponse, AppError> {
    request.validate()?;

    let user = find_by_email(db, &request.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Auth Failed (user does not exist)".to_string()))?;

    let valid = verify(&request.password, &user.password)
        .map_err(|e| AppError::Database(format!("Password verification error: {}", e)))?;

    if !valid {
        return Err(AppError::Unauthorized(
            "Auth Failed (details are not correct)".to_string(),
        ));
    }

    let token = generate_token(&user)?;

    Ok(AuthResponse {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        username: user.username,
        token,
    })
}

// All users, without secret material
pub async fn list_users(db: &MongoDB) -> Result<Vec<PublicUser>, AppError> {
    let collection = db.collection::<User>(COLLECTION);

    let mut cursor = collection.find(doc! {}).await?;
    let mut users = Vec::new();
    while let Some(result) = cursor.next().await {
        users.push(PublicUser::from(result?));
    }

    Ok(users)
}

pub async fn find_by_id(db: &MongoDB, id: &ObjectId) -> Result<Option<User>, AppError> {
    let collection = db.collection::<User>(COLLECTION);
    Ok(collection.find_one(doc! { "_id": id }).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Some(ObjectId::new()),
            username: "chef".to_string(),
            email: "chef@example.com".to_string(),
            password: "$2b$12$hash".to_string(),
            role: Role::Registered,
            address: Some("1 Herb Lane".to_string()),
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let user = sample_user();
        let token = generate_token(&user).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.unwrap().to_hex());
        assert_eq!(claims.username, "chef");
        assert_eq!(claims.role, Role::Registered);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(verify_token("not-a-jwt"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_unrecognized_role_is_forbidden() {
        // Well-signed, unexpired, but the role is outside the closed set
        let claims = serde_json::json!({
            "sub": ObjectId::new().to_hex(),
            "username": "chef",
            "role": "superuser",
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + Duration::days(1)).timestamp(),
            "jti": "test",
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(get_jwt_secret().as_ref()),
        )
        .unwrap();
        assert!(matches!(verify_token(&token), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_signup_validation() {
        let bad_email = SignupRequest {
            username: "chef".to_string(),
            email: "not-an-email".to_string(),
            password: "secret123".to_string(),
            address: None,
        };
        assert!(bad_email.validate().is_err());

        let short_password = SignupRequest {
            username: "chef".to_string(),
            email: "chef@example.com".to_string(),
            password: "abc".to_string(),
            address: None,
        };
        assert!(short_password.validate().is_err());

        let short_username = SignupRequest {
            username: "ab".to_string(),
            email: "chef@example.com".to_string(),
            password: "secret123".to_string(),
            address: None,
        };
        assert!(short_username.validate().is_err());

        let ok = SignupRequest {
            username: "chef".to_string(),
            email: "chef@example.com".to_string(),
            password: "secret123".to_string(),
            address: Some("".to_string()),
        };
        assert!(ok.validate().is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_duplicate_email_performs_no_write() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/recipes-test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();

        let email = format!("dup-{}@example.com", ObjectId::new().to_hex());
        let request = SignupRequest {
            username: "chef".to_string(),
            email: email.clone(),
            password: "secret123".to_string(),
            address: None,
        };
        signup(&db, &request).await.unwrap();

        let second = signup(&db, &request).await;
        assert!(matches!(second, Err(AppError::Duplicate(_))));

        let count = db
            .collection::<User>(COLLECTION)
            .count_documents(doc! { "email": &email })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
