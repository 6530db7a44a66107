use crate::sdk::llm::{GeminiClient, Grounding, LlmError, Reply};
use crate::sdk::location::{CargoMode, Location, Source, UNKNOWN_LEG};
use crate::sdk::util::supersede::{Slot, Supersede};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const NARRATIVE_UNAVAILABLE: &str = "⚠️ Dispatch sheet unavailable.";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

const DISPATCH_SYSTEM: &str =
    "You are a logistics dispatcher. No greetings. Go straight to the technical information.";

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRequest {
    pub base_name: String,
    pub stops: Vec<Location>,
    pub cargo_mode: CargoMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Narrative {
    pub text: String,
    pub sources: Vec<Source>,
}

impl Narrative {
    pub fn unavailable() -> Self {
        Self {
            text: NARRATIVE_UNAVAILABLE.to_string(),
            sources: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Writes the dispatch sheet. Failures come back as [`Narrative::unavailable`].
    async fn generate(&self, request: &NarrativeRequest) -> Narrative;
}

pub struct GeminiNarrator {
    llm: GeminiClient,
}

impl GeminiNarrator {
    pub fn new(llm: GeminiClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl NarrativeGenerator for GeminiNarrator {
    async fn generate(&self, request: &NarrativeRequest) -> Narrative {
        if request.stops.is_empty() {
            return Narrative::default();
        }

        let prompt = build_prompt(request);
        narrative_from(self.llm.generate(&prompt, DISPATCH_SYSTEM, Grounding::Search).await)
    }
}

/// Turns a model reply into a sheet. Any failure becomes the placeholder, with no retry.
fn narrative_from(reply: Result<Reply, LlmError>) -> Narrative {
    match reply {
        Ok(reply) => Narrative {
            text: reply.text,
            sources: reply.web_sources,
        },
        Err(err) => {
            log::error!("Dispatch sheet generation failed: {}", err);
            Narrative::unavailable()
        }
    }
}

fn leg_text(stop: &Location) -> (&str, &str) {
    match &stop.leg {
        Some(leg) => (leg.distance.as_str(), leg.travel_time.as_str()),
        None => (UNKNOWN_LEG, UNKNOWN_LEG),
    }
}

pub fn build_prompt(request: &NarrativeRequest) -> String {
    let route_data = request
        .stops
        .iter()
        .enumerate()
        .map(|(i, stop)| {
            let (distance, time) = leg_text(stop);
            format!(
                "STOP {}: {} ({} and {} from the previous point)",
                i + 1,
                stop.name,
                distance,
                time
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Act as Head of Logistics. Produce the DISPATCH SHEET from this REAL ROUTE DATA:\n\
         BASE: \"{base}\"\n\
         CARGO TYPE: {cargo}\n\
         \n\
         GPS-COMPUTED SEQUENCE:\n\
         {route_data}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Do not invent distances, use the ones provided.\n\
         2. Search for current traffic or incidents on the streets mentioned.\n\
         3. Format:\n\
         \x20  - ROUTE SUMMARY (total times)\n\
         \x20  - LOADING ORDER (how to stow the cargo in the vehicle)\n\
         \x20  - STREET ALERTS (based on real search results)",
        base = request.base_name,
        cargo = request.cargo_mode.guidance(),
        route_data = route_data,
    )
}

/// Holds back narrative generation until edits have been quiet for a full window.
pub struct NarrativeDebouncer<G> {
    generator: Arc<G>,
    window: Duration,
    pending: Supersede<Narrative>,
}

impl<G: NarrativeGenerator + 'static> NarrativeDebouncer<G> {
    pub fn new(generator: Arc<G>, window: Duration) -> Self {
        Self {
            generator,
            window,
            pending: Supersede::new(),
        }
    }

    /// Schedules generation for `request`, replacing anything still waiting.
    pub fn poke(&mut self, request: NarrativeRequest) -> u64 {
        let generator = Arc::clone(&self.generator);
        let window = self.window;
        self.pending.spawn(async move {
            tokio::time::sleep(window).await;
            if request.stops.is_empty() {
                return Narrative::default();
            }
            log::info!("Generating dispatch sheet for {} stops", request.stops.len());
            generator.generate(&request).await
        })
    }

    /// Drops the pending request, if any.
    pub fn cancel(&mut self) {
        self.pending.cancel();
    }

    pub fn subscribe(&self) -> watch::Receiver<Slot<Narrative>> {
        self.pending.subscribe()
    }

    /// The narrative for the latest poke, once its window has passed.
    pub async fn settled(&self) -> Option<Narrative> {
        self.pending.settled().await.map(|v| v.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::llm::parse_reply;
    use crate::sdk::location::LegStats;
    use crate::sdk::util::rate_limit::llm_limiter;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingGenerator {
        seen: Mutex<Vec<NarrativeRequest>>,
    }

    #[async_trait]
    impl NarrativeGenerator for RecordingGenerator {
        async fn generate(&self, request: &NarrativeRequest) -> Narrative {
            self.seen.lock().unwrap().push(request.clone());
            Narrative {
                text: format!("{} stops", request.stops.len()),
                sources: Vec::new(),
            }
        }
    }

    fn request(stops: usize, cargo_mode: CargoMode) -> NarrativeRequest {
        NarrativeRequest {
            base_name: "Alberdi 152".to_string(),
            stops: (0..stops)
                .map(|i| Location::new(format!("Stop {}", i)))
                .collect(),
            cargo_mode,
        }
    }

    #[test]
    fn prompt_lists_stops_with_legs() {
        let mut req = request(2, CargoMode::Assorted);
        req.stops[0].leg = Some(LegStats {
            distance: "1.2 km".to_string(),
            travel_time: "4 min".to_string(),
        });

        let prompt = build_prompt(&req);

        assert!(prompt.contains("BASE: \"Alberdi 152\""));
        assert!(prompt.contains("STOP 1: Stop 0 (1.2 km and 4 min from the previous point)"));
        assert!(prompt.contains("STOP 2: Stop 1 (--- and --- from the previous point)"));
        assert!(prompt.contains("LIFO"));
    }

    #[test]
    fn prompt_reflects_cargo_mode() {
        assert!(build_prompt(&request(1, CargoMode::Uniform)).contains("fast stop turnaround"));
    }

    #[tokio::test]
    async fn unreachable_model_yields_placeholder() {
        let llm = GeminiClient::new("test-key".to_string(), "gemini-test".to_string(), llm_limiter())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let narrator = GeminiNarrator::new(llm);

        let narrative = narrator.generate(&request(2, CargoMode::Uniform)).await;

        assert_eq!(narrative, Narrative::unavailable());
        assert!(narrative.sources.is_empty());
    }

    #[test]
    fn empty_replies_yield_placeholder() {
        assert_eq!(narrative_from(parse_reply(r#"{"candidates": []}"#)), Narrative::unavailable());
        let blank = r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}}]}"#;
        assert_eq!(narrative_from(parse_reply(blank)), Narrative::unavailable());
    }

    #[test]
    fn reply_keeps_web_sources_only() {
        let body = r#"{"candidates": [{
            "content": {"parts": [{"text": "ROUTE SUMMARY: 12 min"}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"title": "Traffic", "uri": "https://example.org/traffic"}},
                {"maps": {"title": "Depot", "uri": "https://maps.google.com/?cid=2"}}
            ]}
        }]}"#;

        let narrative = narrative_from(parse_reply(body));

        assert_eq!(narrative.text, "ROUTE SUMMARY: 12 min");
        assert_eq!(narrative.sources.len(), 1);
        assert_eq!(narrative.sources[0].title.as_deref(), Some("Traffic"));
    }

    #[tokio::test]
    async fn narrator_skips_the_model_without_stops() {
        let llm = GeminiClient::new("test-key".to_string(), "gemini-test".to_string(), llm_limiter())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let narrative = GeminiNarrator::new(llm).generate(&request(0, CargoMode::Uniform)).await;

        assert!(narrative.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_pokes_collapse_into_one_call() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut debouncer = NarrativeDebouncer::new(Arc::clone(&generator), DEFAULT_DEBOUNCE);

        debouncer.poke(request(1, CargoMode::Uniform));
        tokio::time::sleep(Duration::from_millis(500)).await;
        debouncer.poke(request(2, CargoMode::Uniform));
        tokio::time::sleep(Duration::from_millis(500)).await;
        debouncer.poke(request(3, CargoMode::Assorted));

        let narrative = debouncer.settled().await.unwrap();

        assert_eq!(narrative.text, "3 stops");
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].cargo_mode, CargoMode::Assorted);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_waits_for_the_quiet_window() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut debouncer = NarrativeDebouncer::new(Arc::clone(&generator), DEFAULT_DEBOUNCE);
        let started = Instant::now();

        debouncer.poke(request(1, CargoMode::Uniform));
        debouncer.settled().await.unwrap();

        assert!(started.elapsed() >= DEFAULT_DEBOUNCE);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_route_skips_the_generator() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut debouncer = NarrativeDebouncer::new(Arc::clone(&generator), DEFAULT_DEBOUNCE);

        debouncer.poke(request(0, CargoMode::Uniform));

        assert!(debouncer.settled().await.unwrap().is_empty());
        assert!(generator.seen.lock().unwrap().is_empty());
    }
}
