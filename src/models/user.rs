use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Closed role set. The wire values match the roles issued at signup and
/// embedded in tokens; anything else fails deserialization and is rejected
/// at the auth boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "registered user")]
    Registered,
}

impl Role {
    /// Capability check for recipe create/update/delete.
    pub fn can_mutate_recipes(self) -> bool {
        matches!(self, Role::Admin | Role::User | Role::Registered)
    }
}

fn default_role() -> Role {
    Role::Registered
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// User as exposed by GET /api/users. No password material.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username,
            email: user.email,
            role: user.role,
            address: user.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Registered).unwrap(), "\"registered user\"");
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn test_all_known_roles_can_mutate() {
        assert!(Role::Admin.can_mutate_recipes());
        assert!(Role::User.can_mutate_recipes());
        assert!(Role::Registered.can_mutate_recipes());
    }

    #[test]
    fn test_public_user_has_no_password() {
        let user = User {
            id: Some(ObjectId::new()),
            username: "chef".to_string(),
            email: "chef@example.com".to_string(),
            password: "$2b$12$secret".to_string(),
            role: Role::Registered,
            address: None,
        };
        let public = PublicUser::from(user);
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secret"));
    }
}
