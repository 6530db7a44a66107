use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder shown when a leg could not be measured.
pub const UNKNOWN_LEG: &str = "---";

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }

    /// Straight-line distance in raw degree space. Only used to rank candidates.
    pub fn proxy_distance(&self, other: &Coordinate) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        (dlat * dlat + dlng * dlng).sqrt()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// Synthetic identity of a location inside the working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub u64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display strings for the leg leading into a stop. Both halves are known or neither is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegStats {
    pub distance: String,
    pub travel_time: String,
}

impl LegStats {
    pub fn unavailable() -> Self {
        Self {
            distance: UNKNOWN_LEG.to_string(),
            travel_time: UNKNOWN_LEG.to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.distance == UNKNOWN_LEG && self.travel_time == UNKNOWN_LEG
    }
}

/// The base or one delivery destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg: Option<LegStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_uri: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LocationId::default(),
            name: name.into(),
            description: String::new(),
            coordinates: None,
            leg: None,
            maps_uri: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinate) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// How the vehicle is loaded, which changes the loading guidance in the dispatch sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CargoMode {
    /// Identical product at every stop, e.g. water jugs.
    #[default]
    Uniform,
    /// Individual packages per customer.
    Assorted,
}

impl CargoMode {
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Uniform => {
                "UNIFORM LOAD (water/soda jugs): identical product at every stop. Prioritize a fast stop turnaround."
            }
            Self::Assorted => {
                "ASSORTED PACKAGES: individual items per customer. Load the vehicle in reverse delivery order (LIFO)."
            }
        }
    }
}

impl fmt::Display for CargoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => f.write_str("uniform"),
            Self::Assorted => f.write_str("assorted"),
        }
    }
}

impl std::str::FromStr for CargoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "assorted" => Ok(Self::Assorted),
            other => Err(format!("Unknown cargo mode: {}", other)),
        }
    }
}

/// Attribution for text produced by a grounded model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_out_of_range_values() {
        assert!(Coordinate::new(-37.32, -59.13).is_some());
        assert!(Coordinate::new(91.0, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn proxy_distance_is_euclidean_in_degrees() {
        let a = Coordinate { lat: 0.0, lng: 0.0 };
        let b = Coordinate { lat: 3.0, lng: 4.0 };
        assert_eq!(a.proxy_distance(&b), 5.0);
    }

    #[test]
    fn cargo_mode_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&CargoMode::Assorted).unwrap(), "\"assorted\"");
        assert_eq!("Uniform".parse::<CargoMode>(), Ok(CargoMode::Uniform));
        assert!("bulk".parse::<CargoMode>().is_err());
    }

    #[test]
    fn location_without_optional_fields_deserializes() {
        let loc: Location = serde_json::from_str(r#"{"name":"Alberdi 152"}"#).unwrap();
        assert_eq!(loc.id, LocationId(0));
        assert!(loc.coordinates.is_none());
        assert!(loc.leg.is_none());
    }
}
