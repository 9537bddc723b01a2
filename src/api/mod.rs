pub mod categories;
pub mod health;
pub mod recipes;
pub mod swagger;
pub mod users;
