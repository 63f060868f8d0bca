pub mod expand;
pub mod index;
pub mod memory;
pub mod path;
pub mod similarity;

pub use expand::GraphRetriever;
pub use index::{Reach, RelationIndex};
pub use memory::{CodeGraph, GraphSnapshot, GraphStats};
pub use path::{enumerate_paths, Neighborhood, PathLimits};
pub use similarity::{NeighborList, SimilarityEdgeBuilder, SimilarityStats};
