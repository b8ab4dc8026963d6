pub mod catalog;
pub mod ingest;
pub mod render;
pub mod retrieve;
