pub mod board;
pub mod config;
pub mod llm;
pub mod location;
pub mod narrative;
pub mod routing;
pub mod sequencer;
pub mod store;
pub mod util;
