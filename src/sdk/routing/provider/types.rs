use crate::sdk::location::Coordinate;
use serde::Deserialize;

// --- Data Structures for parsing OSRM route responses ---

#[derive(Deserialize, Debug)]
pub struct RouteResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Deserialize, Debug)]
pub struct Route {
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// GeoJSON line string, positions are `[lng, lat]`.
#[derive(Deserialize, Debug)]
pub struct Geometry {
    pub coordinates: Vec<[f64; 2]>,
}

impl Geometry {
    pub fn to_coordinates(&self) -> Vec<Coordinate> {
        self.coordinates
            .iter()
            .filter_map(|[lng, lat]| Coordinate::new(*lat, *lng))
            .collect()
    }
}
