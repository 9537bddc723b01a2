mod api;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Get configuration from environment
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "mongodb://localhost:27017/recipes".to_string());

    log::info!("🚀 Starting Recipe Service...");
    log::info!("📊 Database: {}", database_url);

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db_data = web::Data::new(db.clone());

    log::info!("✅ MongoDB connected successfully");

    // Images directory must exist before actix-files mounts it
    std::fs::create_dir_all(utils::upload::images_dir())
        .expect("Failed to create images directory");
    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::permissive();

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Uploaded recipe images
            .service(actix_files::Files::new("/images", utils::upload::images_dir()))
            // Users: signup, signin, listing
            .service(
                web::scope("/api/users")
                    .route("/signup", web::post().to(api::users::signup))
                    .route("/signin", web::post().to(api::users::signin))
                    .route("", web::get().to(api::users::get_all_users)),
            )
            // Recipes: optional identity on reads, role-gated mutations
            .service(
                web::scope("/api/recipes")
                    .service(
                        web::resource("")
                            .route(
                                web::get()
                                    .wrap(middleware::OptionalAuth)
                                    .to(api::recipes::get_all_recipes),
                            )
                            .route(
                                web::post()
                                    .wrap(middleware::RequireAuth)
                                    .to(api::recipes::add_recipe),
                            ),
                    )
                    .service(
                        web::resource("/byUser/{userId}")
                            .wrap(middleware::OptionalAuth)
                            .route(web::get().to(api::recipes::get_recipes_by_user)),
                    )
                    .service(
                        web::resource("/byPreparationTime/{minutes}")
                            .wrap(middleware::OptionalAuth)
                            .route(web::get().to(api::recipes::get_recipes_by_preparation_time)),
                    )
                    // Must stay last (catch-all)
                    .service(
                        web::resource("/{id}")
                            .route(
                                web::get()
                                    .wrap(middleware::OptionalAuth)
                                    .to(api::recipes::get_recipe_by_id),
                            )
                            .route(
                                web::put()
                                    .wrap(middleware::RequireAuth)
                                    .to(api::recipes::update_recipe),
                            )
                            .route(
                                web::delete()
                                    .wrap(middleware::RequireAuth)
                                    .to(api::recipes::delete_recipe),
                            ),
                    ),
            )
            // Categories: plain listing plus joined views
            .service(
                web::scope("/api/categories")
                    .route("", web::get().to(api::categories::get_all_categories))
                    .service(
                        web::resource("/withRecipes")
                            .wrap(middleware::OptionalAuth)
                            .route(web::get().to(api::categories::get_categories_with_recipes)),
                    )
                    // Must stay last (catch-all)
                    .service(
                        web::resource("/{id}")
                            .wrap(middleware::OptionalAuth)
                            .route(web::get().to(api::categories::get_category_by_id)),
                    ),
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
