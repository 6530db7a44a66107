use super::route::RouteSummary;
use crate::sdk::location::Coordinate;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fs, io::Result as IoResult, path::Path, str::FromStr};

/// Directed leg key. Driving legs aren't symmetric, so origin and destination keep their order.
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug)]
pub struct LegKey {
    pub origin: String,
    pub destination: String,
}

impl LegKey {
    /// Coordinates are keyed at 5 decimals, roughly a meter.
    pub fn new(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }
}

impl fmt::Display for LegKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.origin, self.destination)
    }
}

impl FromStr for LegKey {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("::") {
            Some((origin, destination)) if !origin.is_empty() && !destination.is_empty() => {
                Ok(LegKey {
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                })
            }
            _ => Err("Invalid LegKey format"),
        }
    }
}

// --- Serde Helper for Complex Key ---
mod leg_map {
    use super::{LegKey, RouteSummary};
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::{collections::HashMap, str::FromStr};

    pub fn serialize<S: Serializer>(
        map: &HashMap<LegKey, RouteSummary>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let string_map: HashMap<String, &RouteSummary> =
            map.iter().map(|(k, v)| (k.to_string(), v)).collect();
        string_map.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<LegKey, RouteSummary>, D::Error> {
        let string_map = HashMap::<String, RouteSummary>::deserialize(deserializer)?;
        string_map
            .into_iter()
            .map(|(k, v)| Ok((LegKey::from_str(&k).map_err(Error::custom)?, v)))
            .collect()
    }
}

/// Best-effort store of successful leg lookups.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct LegCache {
    #[serde(with = "leg_map")]
    legs: HashMap<LegKey, RouteSummary>,
}

impl LegCache {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        if path.as_ref().exists() {
            let data = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
    }

    pub fn get_leg(&self, key: &LegKey) -> Option<RouteSummary> {
        self.legs.get(key).copied()
    }

    pub fn insert_leg(&mut self, key: LegKey, summary: RouteSummary) {
        self.legs.insert(key, summary);
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn key_is_directed() {
        let a = at(-37.32, -59.13);
        let b = at(-37.33, -59.14);
        assert_ne!(LegKey::new(a, b), LegKey::new(b, a));
    }

    #[test]
    fn key_ignores_sub_meter_noise() {
        assert_eq!(
            LegKey::new(at(-37.320001, -59.13), at(1.0, 1.0)),
            LegKey::new(at(-37.320002, -59.13), at(1.0, 1.0))
        );
    }

    #[test]
    fn malformed_key_is_rejected() {
        assert!(LegKey::from_str("1.0,2.0").is_err());
        assert!(LegKey::from_str("::1.0,2.0").is_err());
    }

    #[test]
    fn cache_survives_json_roundtrip() {
        let mut cache = LegCache::default();
        let key = LegKey::new(at(0.0, 0.0), at(1.0, 1.0));
        let summary = RouteSummary {
            distance_m: 1500.0,
            duration_s: 240.0,
        };
        cache.insert_leg(key.clone(), summary);

        let text = serde_json::to_string(&cache).unwrap();
        assert!(text.contains("0.00000,0.00000::1.00000,1.00000"));
        let restored: LegCache = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.get_leg(&key), Some(summary));
    }
}
