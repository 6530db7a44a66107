pub mod sdk;

pub use sdk::board::DispatchBoard;
pub use sdk::config::DispatchConfig;
pub use sdk::location::{CargoMode, Coordinate, LegStats, Location, LocationId, Source};
pub use sdk::narrative::{Narrative, NarrativeGenerator, NarrativeRequest};
pub use sdk::routing::{Geocoder, RouteProvider, RouteSummary};
pub use sdk::sequencer::sequence;
pub use sdk::store::DispatchState;
