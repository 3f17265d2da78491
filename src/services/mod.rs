// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod similarity;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use memory::MemoryStore;
pub use postgres::{PostgresStore, StoreError};
pub use similarity::{HttpSimilarityClient, NoSimilarity, SimilarityError, SimilaritySource};
pub use store::NetworkStore;
