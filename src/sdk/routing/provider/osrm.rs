use super::types::{Route, RouteResponse};
use crate::sdk::location::Coordinate;
use crate::sdk::routing::error::{OsrmErrorPayload, RoutingError};
use crate::sdk::routing::route::RouteSummary;
use crate::sdk::routing::service::RouteProvider;
use crate::sdk::util::rate_limit::Limiter;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const PUBLIC_OSRM_URL: &str = "https://router.project-osrm.org";

/// Driving legs from an OSRM `route/v1` endpoint.
pub struct OsrmProvider {
    client: Client,
    base_url: String,
    limiter: Limiter,
}

impl OsrmProvider {
    pub fn new(base_url: impl Into<String>, limiter: Limiter) -> Result<Self, RoutingError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter,
        })
    }

    fn route_url(&self, start: Coordinate, end: Coordinate, overview: &str) -> String {
        // OSRM wants lng,lat
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview={}",
            self.base_url, start.lng, start.lat, end.lng, end.lat, overview
        )
    }

    async fn fetch_route(&self, url: String) -> Result<Route, RoutingError> {
        self.limiter.until_ready().await;
        log::debug!("[PROVIDER] GET {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Failed to send request to OSRM. URL: {}\nError: {}", url, e);
                return Err(e.into());
            }
        };
        let status = response.status();
        let text = response.text().await?;
        parse_route_response(status.is_success(), &text)
    }
}

/// Extracts the first route of an OSRM reply, mapping every failure shape to a `RoutingError`.
pub fn parse_route_response(status_ok: bool, text: &str) -> Result<Route, RoutingError> {
    if !status_ok {
        // Try to parse the structured error first
        return match serde_json::from_str::<OsrmErrorPayload>(text) {
            Ok(payload) if payload.code == "NoRoute" => Err(RoutingError::NoRoute),
            Ok(payload) => Err(RoutingError::ApiError {
                code: payload.code,
                message: payload.message,
            }),
            Err(_) => {
                log::error!("OSRM returned non-success status. Unparseable Body: {}", text);
                Err(RoutingError::RawApiError(text.to_string()))
            }
        };
    }

    let body: RouteResponse = serde_json::from_str(text).map_err(|e| {
        log::error!("Failed to parse OSRM RouteResponse. Error: {}. Body: {}", e, text);
        e
    })?;

    if body.code != "Ok" {
        return Err(RoutingError::ApiError {
            code: body.code,
            message: body.message.unwrap_or_default(),
        });
    }

    body.routes.into_iter().next().ok_or(RoutingError::NoRoute)
}

#[async_trait]
impl RouteProvider for OsrmProvider {
    async fn get_directions(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        if start == end {
            log::debug!("Start and end coordinates are identical. Returning zero route.");
            return Ok(RouteSummary::zero());
        }

        let route = self.fetch_route(self.route_url(start, end, "false")).await?;
        Ok(RouteSummary {
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }

    async fn get_geometry(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<Coordinate>, RoutingError> {
        if start == end {
            return Ok(vec![start]);
        }

        let url = format!("{}&geometries=geojson", self.route_url(start, end, "full"));
        let route = self.fetch_route(url).await?;
        let geometry = route
            .geometry
            .ok_or_else(|| RoutingError::Generic("Route without geometry".to_string()))?;
        Ok(geometry.to_coordinates())
    }
}
