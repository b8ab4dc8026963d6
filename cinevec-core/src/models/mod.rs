pub mod movie;
pub mod record;
pub mod schema;

pub use movie::{MovieRecord, QueryResult};
pub use record::{Record, ScoredRecord};
pub use schema::{Collection, CollectionSchema, DistanceFunction, FieldDescriptor, FieldRole};
