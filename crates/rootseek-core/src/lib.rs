pub mod error;
pub mod layer;
pub mod models;
pub mod query;
pub mod timeout;
pub mod traits;

pub use error::RetrievalError;
pub use layer::{LayerClassifier, LayerPriority};
pub use models::*;
pub use query::Query;
pub use traits::*;
