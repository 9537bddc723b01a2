pub mod error;
pub mod upload;

pub use error::*;
pub use upload::*;
