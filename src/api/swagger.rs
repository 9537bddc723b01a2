use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recipe Service API",
        version = "1.0.0",
        description = "Recipe-sharing REST backend. \n\n**Authentication:** mutation endpoints require a JWT Bearer token; read endpoints accept one optionally and widen results to the caller's own private recipes.\n\n**Features:**\n- Signup / signin with JWT issuance\n- Recipes with categories, pagination and case-insensitive search\n- Public/private visibility with ownership\n- Category views with joined recipes\n- Image upload for recipes"
    ),
    paths(
        // Users
        crate::api::users::signup,
        crate::api::users::signin,
        crate::api::users::get_all_users,

        // Recipes
        crate::api::recipes::get_all_recipes,
        crate::api::recipes::get_recipe_by_id,
        crate::api::recipes::get_recipes_by_user,
        crate::api::recipes::get_recipes_by_preparation_time,
        crate::api::recipes::add_recipe,
        crate::api::recipes::update_recipe,
        crate::api::recipes::delete_recipe,

        // Categories
        crate::api::categories::get_all_categories,
        crate::api::categories::get_categories_with_recipes,
        crate::api::categories::get_category_by_id,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::user_service::SignupRequest,
            crate::services::user_service::SigninRequest,
            crate::services::user_service::AuthResponse,
            crate::models::PublicUser,
            crate::models::Role,
            crate::models::Difficulty,
            crate::models::RecipeResponse,
            crate::models::RecipeSummary,
            crate::models::OwnerResponse,
            crate::models::CategoryResponse,
            crate::models::CategoryWithRecipes,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "Signup, signin and user listing."),
        (name = "Recipes", description = "Recipe browsing and role-gated mutation. Listings are visibility-filtered and paginated."),
        (name = "Categories", description = "Category listings, with or without joined recipes."),
        (name = "Health", description = "Service health endpoint."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build(),
                ),
            );
        }
    }
}
