use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use route_dispatch::sdk::{
    board::DispatchBoard,
    config::DispatchConfig,
    llm::GeminiClient,
    location::{CargoMode, Coordinate, Location, LocationId, Source},
    narrative::{GeminiNarrator, Narrative},
    routing::{
        cache::LegCache,
        geocode::{GeminiGeocoder, GeocodeError, Geocoder},
        provider::{CachedProvider, OsrmProvider},
        service::RouteProvider,
    },
    store::DispatchState,
    util::{
        log::init_logging,
        rate_limit::{llm_limiter, osrm_limiter},
    },
};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

type Provider = CachedProvider<OsrmProvider>;
type Board = DispatchBoard<Provider, GeminiNarrator>;

/// Plan a delivery run: set a base, add stops, get a visit order and a dispatch sheet
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Set the base the route starts from (e.g. "Alberdi 152, Tandil")
    Base { address: Vec<String> },
    /// Add a delivery stop
    Add { address: Vec<String> },
    /// Remove a stop by its id
    Remove { id: u64 },
    /// Show the base and the current visit order
    List,
    /// Set the cargo mode: uniform or assorted
    Cargo { mode: CargoMode },
    /// Write the dispatch sheet for the current route
    Sheet,
    /// Suggest addresses for a partial query
    Suggest { query: Vec<String> },
    /// Print the route as GeoJSON
    Export,
    /// Forget the base, the stops and the cargo mode
    Reset,
    /// Interactive session, dispatch sheets are printed as edits settle
    Shell,
}

impl Command {
    /// Whether the command can reach the model, and so needs an API key.
    fn uses_model(&self) -> bool {
        matches!(
            self,
            Self::Base { .. } | Self::Add { .. } | Self::Sheet | Self::Suggest { .. } | Self::Shell
        )
    }
}

struct App {
    config: DispatchConfig,
    geocoder: GeminiGeocoder,
    board: Board,
}

impl App {
    /// Wires the clients. The key is only checked when `command` can reach the model,
    /// so offline commands work without one.
    fn build(config: DispatchConfig, command: &Command) -> Result<Self> {
        let api_key = if command.uses_model() {
            config.require_gemini_key()?.to_string()
        } else {
            config.gemini_api_key.clone().unwrap_or_default()
        };
        let gemini = |key: String| -> Result<GeminiClient> {
            Ok(GeminiClient::new(key, config.gemini_model.clone(), llm_limiter())?
                .with_base_url(config.gemini_base_url.as_str()))
        };
        let geocode_llm = gemini(api_key.clone())?;
        let narrative_llm = gemini(api_key)?;

        let cache = LegCache::load_from_file(&config.leg_cache_file)
            .with_context(|| format!("Failed to read {}", config.leg_cache_file.display()))?;
        let osrm = OsrmProvider::new(config.osrm_base_url.clone(), osrm_limiter())?;
        let provider = Arc::new(CachedProvider::new(osrm, cache));

        let state = DispatchState::load_from_file(&config.state_file)
            .with_context(|| format!("Failed to read {}", config.state_file.display()))?;
        let board = DispatchBoard::new(
            provider,
            Arc::new(GeminiNarrator::new(narrative_llm)),
            state,
            config.narrative_debounce,
        );

        Ok(Self {
            config,
            geocoder: GeminiGeocoder::new(geocode_llm),
            board,
        })
    }

    fn save(&self) -> Result<()> {
        self.board
            .state()
            .save_to_file(&self.config.state_file)
            .with_context(|| format!("Failed to write {}", self.config.state_file.display()))?;
        self.board.provider().with_cache(|cache| {
            // Losing the leg cache only costs extra requests next time
            if let Err(err) = cache.save_to_file(&self.config.leg_cache_file) {
                log::warn!("Could not save leg cache: {}", err);
            }
        });
        Ok(())
    }

    /// Geocodes `address`, keeping the result even when it carries no coordinates.
    async fn resolve(&self, address: &str, context: &str) -> Result<Location> {
        match self.geocoder.geocode(address, context).await {
            Ok(geocoded) => Ok(geocoded.location),
            Err(GeocodeError::Unpositioned(geocoded)) => {
                log::warn!(
                    "\"{}\" could not be placed on the map, it will be kept without a leg",
                    address
                );
                Ok(geocoded.location)
            }
            Err(err) => Err(err).with_context(|| format!("Failed to resolve \"{}\"", address)),
        }
    }

    async fn set_base(&mut self, address: &str) -> Result<()> {
        let base = self.resolve(address, address).await?;
        self.board.set_base(base);
        self.board.sync().await;
        Ok(())
    }

    async fn add(&mut self, address: &str) -> Result<()> {
        let Some(base) = self.board.state().base.as_ref() else {
            bail!("Set a base first with `base <address>`");
        };
        let context = base.name.clone();
        let stop = self.resolve(address, &context).await?;
        self.board.add_destination(stop);
        self.board.sync().await;
        Ok(())
    }

    async fn remove(&mut self, id: u64) -> Result<()> {
        match self.board.remove_destination(LocationId(id)) {
            Some(_) => {
                self.board.sync().await;
                Ok(())
            }
            None => bail!("No stop with id {}", id),
        }
    }

    async fn suggest(&self, query: &str) -> Vec<String> {
        let context = self.board.state().base.as_ref().map(|b| b.name.as_str());
        self.geocoder.suggest(query, context).await
    }

    async fn export(&self) -> Result<serde_json::Value> {
        let state = self.board.state();
        let mut features = Vec::new();
        let Some(base) = &state.base else {
            return Ok(json!({ "type": "FeatureCollection", "features": features }));
        };

        if let Some(coord) = base.coordinates {
            features.push(point_feature(base, coord, "base", None));
        }
        let mut previous = base.coordinates;
        for (i, stop) in state.destinations.iter().enumerate() {
            let Some(coord) = stop.coordinates else {
                continue;
            };
            features.push(point_feature(stop, coord, "stop", Some(i + 1)));
            if let Some(from) = previous {
                match self.board.provider().get_geometry(from, coord).await {
                    Ok(line) => features.push(json!({
                        "type": "Feature",
                        "properties": { "kind": "leg", "to": stop.id },
                        "geometry": {
                            "type": "LineString",
                            "coordinates": line.iter().map(|c| [c.lng, c.lat]).collect::<Vec<_>>(),
                        },
                    })),
                    Err(err) => log::warn!("No geometry for leg to \"{}\": {}", stop.name, err),
                }
            }
            previous = Some(coord);
        }
        Ok(json!({ "type": "FeatureCollection", "features": features }))
    }
}

fn point_feature(location: &Location, coord: Coordinate, kind: &str, order: Option<usize>) -> serde_json::Value {
    json!({
        "type": "Feature",
        "properties": {
            "kind": kind,
            "id": location.id,
            "order": order,
            "name": location.name,
            "distance": location.leg.as_ref().map(|l| l.distance.as_str()),
            "travel_time": location.leg.as_ref().map(|l| l.travel_time.as_str()),
        },
        "geometry": { "type": "Point", "coordinates": [coord.lng, coord.lat] },
    })
}

fn print_route(state: &DispatchState) {
    match &state.base {
        Some(base) => println!("BASE  {}  {}", base.name, position(base)),
        None => println!("BASE  (not set)"),
    }
    println!("CARGO {}", state.cargo_mode);
    if state.destinations.is_empty() {
        println!("No stops yet.");
        return;
    }
    for (i, stop) in state.destinations.iter().enumerate() {
        let (distance, time) = stop
            .leg
            .as_ref()
            .map(|l| (l.distance.as_str(), l.travel_time.as_str()))
            .unwrap_or(("---", "---"));
        println!(
            "{:>3}. [{}] {}  ({}, {})  {}",
            i + 1,
            stop.id.0,
            stop.name,
            distance,
            time,
            position(stop)
        );
        if !stop.description.is_empty() {
            println!("       {}", stop.description);
        }
    }
}

fn position(location: &Location) -> String {
    location
        .coordinates
        .map(|c| format!("@ {:.5}, {:.5}", c.lat, c.lng))
        .unwrap_or_else(|| "@ unknown".to_string())
}

fn print_sheet(narrative: &Narrative) {
    if narrative.is_empty() {
        println!("Nothing to dispatch yet.");
        return;
    }
    println!("===== DISPATCH SHEET =====");
    println!("{}", narrative.text.trim());
    print_sources(&narrative.sources);
}

fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }
    println!("--- sources ---");
    for source in sources {
        println!(
            "* {} {}",
            source.title.as_deref().unwrap_or("(untitled)"),
            source.uri.as_deref().unwrap_or("")
        );
    }
}

async fn run_command(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Base { address } => {
            app.set_base(&address.join(" ")).await?;
            print_route(app.board.state());
        }
        Command::Add { address } => {
            app.add(&address.join(" ")).await?;
            print_route(app.board.state());
        }
        Command::Remove { id } => {
            app.remove(id).await?;
            print_route(app.board.state());
        }
        Command::List => print_route(app.board.state()),
        Command::Cargo { mode } => {
            app.board.set_cargo_mode(mode);
            println!("Cargo mode set to {}", mode);
        }
        Command::Sheet => {
            app.board.sync().await;
            print_sheet(&app.board.dispatch_sheet().await);
        }
        Command::Suggest { query } => {
            for line in app.suggest(&query.join(" ")).await {
                println!("{}", line);
            }
        }
        Command::Export => {
            let collection = app.export().await?;
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        Command::Reset | Command::Shell => bail!("reset and shell can't run inside a session"),
    }
    Ok(())
}

fn parse_shell_line(line: &str) -> Result<Option<Command>> {
    let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let Some((verb, rest)) = words.split_first() else {
        return Ok(None);
    };
    let rest = rest.to_vec();
    let command = match verb.as_str() {
        "base" => Command::Base { address: rest },
        "add" => Command::Add { address: rest },
        "remove" | "rm" => {
            let raw = rest.first().context("usage: remove <id>")?;
            Command::Remove {
                id: raw.trim_start_matches('#').parse().context("id must be a number")?,
            }
        }
        "list" | "ls" => Command::List,
        "cargo" => {
            let raw = rest.first().context("usage: cargo <uniform|assorted>")?;
            Command::Cargo {
                mode: raw.parse().map_err(anyhow::Error::msg)?,
            }
        }
        "sheet" => Command::Sheet,
        "suggest" => Command::Suggest { query: rest },
        "export" => Command::Export,
        other => bail!("Unknown command: {} (base, add, remove, list, cargo, sheet, suggest, export, quit)", other),
    };
    Ok(Some(command))
}

async fn run_shell(mut app: App) -> Result<()> {
    println!("route-dispatch shell. Type `quit` to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sheets = app.board.narrative().subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let trimmed = line.trim();
                if matches!(trimmed, "quit" | "exit") {
                    break;
                }
                // Sheets are pushed by the debouncer, an explicit `sheet` would only wait for it
                let command = match parse_shell_line(trimmed) {
                    Ok(Some(Command::Sheet)) => {
                        app.board.sync().await;
                        continue;
                    }
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(err) => {
                        eprintln!("{}", err);
                        continue;
                    }
                };
                if let Err(err) = run_command(&mut app, command).await {
                    eprintln!("{:#}", err);
                }
                app.save()?;
            }
            changed = sheets.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = sheets.borrow_and_update().clone();
                if let Some(sheet) = latest {
                    print_sheet(&sheet.value);
                }
            }
        }
    }

    app.save()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    let config = DispatchConfig::from_env()?;

    if let Command::Reset = cli.command {
        if config.state_file.exists() {
            std::fs::remove_file(&config.state_file)
                .with_context(|| format!("Failed to remove {}", config.state_file.display()))?;
        }
        log::info!("Dispatch state cleared");
        return Ok(());
    }

    let mut app = App::build(config, &cli.command)?;

    if let Command::Shell = cli.command {
        return run_shell(app).await;
    }

    run_command(&mut app, cli.command).await?;
    app.save()?;
    Ok(())
}
