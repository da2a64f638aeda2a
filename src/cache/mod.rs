mod store;
mod writer;

pub use store::{CacheError, CacheStore, RedisStore};
pub use writer::{HeadCacheWriter, KEY_PREFIX};
