pub mod category_service;
pub mod category_sync;
pub mod recipe_service;
pub mod user_service;
