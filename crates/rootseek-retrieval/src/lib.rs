pub mod fs;
pub mod lexical;
pub mod semantic;

pub use fs::FsLiteralBackend;
pub use lexical::{lexical_score, LexicalRetriever};
pub use semantic::SemanticRetriever;
