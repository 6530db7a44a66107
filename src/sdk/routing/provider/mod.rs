pub mod cached;
pub mod osrm;
pub mod types;

pub use cached::CachedProvider;
pub use osrm::{OsrmProvider, PUBLIC_OSRM_URL};
