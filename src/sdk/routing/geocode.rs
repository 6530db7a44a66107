use crate::sdk::llm::{GeminiClient, Grounding, LlmError};
use crate::sdk::location::{Coordinate, Location, Source};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;
use thiserror::Error;

const GEOCODE_SYSTEM: &str = "Logistics analyst. Always include a line COORDS: [lat, lng].";
const SUGGEST_SYSTEM: &str = "You are a precise address finder.";
const MAX_SUGGESTIONS: usize = 5;

/// A resolved address and where the answer came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Geocoded {
    pub location: Location,
    pub sources: Vec<Source>,
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    /// The address was described but no coordinate pair could be extracted.
    #[error("No coordinates found for \"{}\"", .0.location.name)]
    Unpositioned(Box<Geocoded>),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves `address`, using `context` (usually the base address) to disambiguate.
    async fn geocode(&self, address: &str, context: &str) -> Result<Geocoded, GeocodeError>;

    /// Up to five real addresses matching a partial query. Never fails, empty on error.
    async fn suggest(&self, query: &str, context: Option<&str>) -> Vec<String>;
}

pub struct GeminiGeocoder {
    llm: GeminiClient,
}

impl GeminiGeocoder {
    pub fn new(llm: GeminiClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Geocoder for GeminiGeocoder {
    async fn geocode(&self, address: &str, context: &str) -> Result<Geocoded, GeocodeError> {
        log::debug!("[GEOCODER] Resolving \"{}\" near \"{}\"", address, context);
        let prompt = format!(
            "Logistics details and COORDINATES for: \"{}\". Base: \"{}\". Format COORDS: [lat, lng]",
            address, context
        );
        let reply = self.llm.generate(&prompt, GEOCODE_SYSTEM, Grounding::Maps).await?;
        let geocoded = build_geocoded(address, &reply.text, reply.maps_sources);

        if geocoded.location.coordinates.is_none() {
            log::warn!("Geocoder reply for \"{}\" carried no coordinates", address);
            return Err(GeocodeError::Unpositioned(Box::new(geocoded)));
        }
        Ok(geocoded)
    }

    async fn suggest(&self, query: &str, context: Option<&str>) -> Vec<String> {
        if query.chars().count() < 3 {
            return Vec::new();
        }
        let near = context.map(|c| format!(" in or near {}", c)).unwrap_or_default();
        let prompt = format!(
            "List 5 real addresses for: \"{}\"{}. Postal addresses only.",
            query, near
        );
        match self.llm.generate(&prompt, SUGGEST_SYSTEM, Grounding::Maps).await {
            Ok(reply) => parse_suggestions(&reply.text),
            Err(err) => {
                log::warn!("Address suggestions for \"{}\" failed: {}", query, err);
                Vec::new()
            }
        }
    }
}

fn coords_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)COORDS:\s*\[\s*(-?\d+\.\d+)\s*,\s*(-?\d+\.\d+)\s*\]")
            .expect("coordinate pattern is valid")
    })
}

/// Pulls the first valid `COORDS: [lat, lng]` pair out of free text.
pub fn extract_coordinates(text: &str) -> Option<Coordinate> {
    let caps = coords_pattern().captures(text)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lng = caps.get(2)?.as_str().parse().ok()?;
    Coordinate::new(lat, lng)
}

/// Everything before the first `COORDS:` marker.
pub fn extract_description(text: &str) -> String {
    let upper = text.to_ascii_uppercase();
    let end = upper.find("COORDS:").unwrap_or(text.len());
    text[..end].trim().to_string()
}

pub fn maps_search_uri(address: &str) -> String {
    Url::parse_with_params(
        "https://www.google.com/maps/search/",
        &[("api", "1"), ("query", address)],
    )
    .map(String::from)
    .unwrap_or_else(|_| "https://www.google.com/maps/search/".to_string())
}

/// Assembles a Location from the model's text and its Maps sources.
pub fn build_geocoded(address: &str, text: &str, sources: Vec<Source>) -> Geocoded {
    let maps_uri = sources
        .iter()
        .find_map(|s| s.uri.clone())
        .unwrap_or_else(|| maps_search_uri(address));

    let mut location = Location::new(address).with_description(extract_description(text));
    location.coordinates = extract_coordinates(text);
    location.maps_uri = Some(maps_uri);

    Geocoded { location, sources }
}

/// Cleans a list-shaped reply into at most five address lines.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | '-' | '*' | '•')
            })
            .trim()
            .to_string()
        })
        .filter(|line| line.chars().count() > 5)
        .take(MAX_SUGGESTIONS)
        .collect()
}
