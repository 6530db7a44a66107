//! Working set of one dispatch session.
//!
//! Every edit to the base or the stop list submits a fresh sequencing run, which
//! cancels the previous one if it is still waiting on the routing provider. Nothing
//! changes in [`DispatchState`] until [`DispatchBoard::sync`] commits the latest run.

use crate::sdk::location::{CargoMode, Location, LocationId};
use crate::sdk::narrative::{Narrative, NarrativeDebouncer, NarrativeGenerator, NarrativeRequest};
use crate::sdk::routing::service::RouteProvider;
use crate::sdk::sequencer::sequence;
use crate::sdk::store::DispatchState;
use crate::sdk::util::supersede::Supersede;
use std::sync::Arc;
use std::time::Duration;

pub struct DispatchBoard<P, G> {
    provider: Arc<P>,
    state: DispatchState,
    next_id: LocationId,
    sequencing: Supersede<Vec<Location>>,
    submitted: u64,
    committed: u64,
    narrative: NarrativeDebouncer<G>,
}

impl<P, G> DispatchBoard<P, G>
where
    P: RouteProvider + 'static,
    G: NarrativeGenerator + 'static,
{
    pub fn new(provider: Arc<P>, generator: Arc<G>, state: DispatchState, debounce: Duration) -> Self {
        let next_id = state.next_id();
        Self {
            provider,
            state,
            next_id,
            sequencing: Supersede::new(),
            submitted: 0,
            committed: 0,
            narrative: NarrativeDebouncer::new(generator, debounce),
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    fn assign_id(&mut self, location: &mut Location) -> LocationId {
        let id = self.next_id;
        self.next_id = LocationId(id.0 + 1);
        location.id = id;
        id
    }

    /// Replaces the base and re-sequences every stop against it. Passing a location
    /// that carries the id of a current stop promotes that stop to base.
    pub fn set_base(&mut self, mut base: Location) -> LocationId {
        let promoted = base.id != LocationId::default()
            && self.state.destinations.iter().any(|loc| loc.id == base.id);
        let id = if promoted {
            base.id
        } else {
            self.assign_id(&mut base)
        };
        self.state.destinations.retain(|loc| loc.id != id);
        base.leg = None;
        log::info!("Base set to \"{}\" ({})", base.name, id);
        self.state.base = Some(base);
        self.submit();
        id
    }

    /// Appends a stop and re-sequences.
    pub fn add_destination(&mut self, mut location: Location) -> LocationId {
        let id = self.assign_id(&mut location);
        log::info!("Stop \"{}\" added ({})", location.name, id);
        self.state.destinations.push(location);
        self.submit();
        id
    }

    /// Drops the stop with `id` and re-sequences so its successor gets a fresh leg.
    pub fn remove_destination(&mut self, id: LocationId) -> Option<Location> {
        let idx = self.state.destinations.iter().position(|loc| loc.id == id)?;
        let removed = self.state.destinations.remove(idx);
        log::info!("Stop \"{}\" removed ({})", removed.name, id);
        self.submit();
        Some(removed)
    }

    /// Updates the cargo mode. While a sequencing run is pending the stop list is not
    /// final yet, so the dispatch sheet is left to the next [`Self::sync`].
    pub fn set_cargo_mode(&mut self, mode: CargoMode) {
        if self.state.cargo_mode != mode {
            self.state.cargo_mode = mode;
            if !self.sequencing_pending() {
                self.poke_narrative();
            }
        }
    }

    fn sequencing_pending(&self) -> bool {
        self.submitted > self.committed
    }

    /// Starts a sequencing run over the current stops, superseding any run in flight.
    /// A pending dispatch sheet would describe the old stops, so it is dropped too.
    fn submit(&mut self) {
        self.narrative.cancel();
        let Some(base) = self.state.base.clone() else {
            log::debug!("No base yet, keeping insertion order");
            return;
        };
        let provider = Arc::clone(&self.provider);
        let destinations = self.state.destinations.clone();
        let generation = self
            .sequencing
            .spawn(async move { sequence(provider.as_ref(), &base, destinations).await });
        self.submitted = generation;
        log::debug!("Sequencing run {} submitted", generation);
    }

    /// Waits for the latest sequencing run, commits its order and schedules a new
    /// dispatch sheet.
    pub async fn sync(&mut self) -> &[Location] {
        match self.sequencing.settled().await {
            Some(run) if run.generation > self.committed => {
                log::debug!("Committing sequencing run {}", run.generation);
                self.committed = run.generation;
                self.state.destinations = run.value;
            }
            Some(_) => {}
            None if self.sequencing_pending() => {
                log::warn!(
                    "Sequencing run {} ended without a result, keeping the previous order",
                    self.submitted
                );
                self.committed = self.submitted;
            }
            None => {}
        }
        self.poke_narrative();
        &self.state.destinations
    }

    fn poke_narrative(&mut self) {
        let request = NarrativeRequest {
            base_name: self
                .state
                .base
                .as_ref()
                .map(|b| b.name.clone())
                .unwrap_or_default(),
            stops: if self.state.base.is_some() {
                self.state.destinations.clone()
            } else {
                Vec::new()
            },
            cargo_mode: self.state.cargo_mode,
        };
        self.narrative.poke(request);
    }

    /// The dispatch sheet for the sequenced stops, once edits have gone quiet. A pending
    /// sequencing run is committed first.
    pub async fn dispatch_sheet(&mut self) -> Narrative {
        if self.sequencing_pending() {
            self.sync().await;
        }
        self.narrative.settled().await.unwrap_or_default()
    }

    pub fn narrative(&self) -> &NarrativeDebouncer<G> {
        &self.narrative
    }
}
