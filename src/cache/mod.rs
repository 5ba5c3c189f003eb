//! Cache module for storing TMDB responses and poster images to disk
//!
//! Entries are plain files under a cache root. Freshness is derived from the
//! file's modification time against a TTL; structured entries must also parse
//! as the expected type. Writes go through a staging file and a rename so a
//! visible entry is always complete.

mod store;
mod writes;

pub use store::{encode_key, CacheError, CacheStore, StagedFile, DEFAULT_TTL_DAYS};
pub use writes::BackgroundWrites;
