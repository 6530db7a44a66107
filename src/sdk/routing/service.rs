use super::error::RoutingError;
use super::route::RouteSummary;
use crate::sdk::location::Coordinate;
use async_trait::async_trait;

#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Gets driving distance and duration between two points.
    async fn get_directions(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RouteSummary, RoutingError>;

    /// Gets the driving polyline between two points, start to end.
    async fn get_geometry(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<Coordinate>, RoutingError>;
}
