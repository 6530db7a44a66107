pub mod cache;
pub mod error;
pub mod geocode;
pub mod provider;
pub mod route;
pub mod service;

pub use cache::{LegCache, LegKey};
pub use error::RoutingError;
pub use geocode::{GeminiGeocoder, GeocodeError, Geocoded, Geocoder};
pub use provider::{CachedProvider, OsrmProvider};
pub use route::{RouteSummary, format_distance, format_duration};
pub use service::RouteProvider;
