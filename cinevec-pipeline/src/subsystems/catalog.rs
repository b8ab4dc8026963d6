//! The demo movie catalog

use cinevec_core::{Collection, MovieRecord, StoreError};

/// The four demo movies, keys `0..=3`, without vectors.
pub fn movie_catalog() -> Vec<MovieRecord> {
    vec![
        MovieRecord::new(
            0,
            "Lion King",
            "The Lion King is a classic Disney animated film that tells the story of a young lion named Simba who embarks on a journey to reclaim his throne as the king of the Pride Lands after the tragic death of his father.",
        ),
        MovieRecord::new(
            1,
            "Inception",
            "Inception is a science fiction film directed by Christopher Nolan that follows a group of thieves who enter the dreams of their targets to steal information.",
        ),
        MovieRecord::new(
            2,
            "The Matrix",
            "The Matrix is a science fiction film directed by the Wachowskis that follows a computer hacker named Neo who discovers that the world he lives in is a simulated reality created by machines.",
        ),
        MovieRecord::new(
            3,
            "Shrek",
            "Shrek is an animated film that tells the story of an ogre named Shrek who embarks on a quest to rescue Princess Fiona from a dragon and bring her back to the kingdom of Duloc.",
        ),
    ]
}

/// The `name` collection for movies with `dimensions`-long embeddings.
pub fn movies_collection(name: &str, dimensions: usize) -> Result<Collection, StoreError> {
    Collection::new(name, MovieRecord::schema(dimensions))
}
