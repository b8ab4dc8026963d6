pub mod error;
pub mod subsystems;

pub use error::PipelineError;
pub use subsystems::catalog::{movie_catalog, movies_collection};
pub use subsystems::ingest::{ingest_catalog, IngestReport};
pub use subsystems::render::{render_json, render_text};
pub use subsystems::retrieve::{search_movies, QueryOptions};
