pub mod error;
pub mod labels;
pub mod model;
pub mod routes;
pub mod utils;

pub use error::AppError;
pub use model::{Classifier, Model, ModelError, PreprocessedImage};
pub use routes::{router, AppState};
pub use utils::Settings;
