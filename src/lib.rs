//! Studio-style AI variations of a single photo.
//!
//! A [`VariationOrchestrator`] takes a [`SourceImage`] and [`StudioSettings`],
//! builds one prompt, fans out `count` concurrent generation calls with
//! distinct seeds, and returns every image that came back, in dispatch order.

pub mod config;
pub mod error;
pub mod io;
pub mod media;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod settings;

pub use config::{ApiKey, ClientConfig, ProviderCfg, ProviderKind, StudioCfg};
pub use error::{AttemptError, ProviderError, StudioError};
pub use media::{GeneratedImage, SourceImage};
pub use orchestrator::{BatchReport, VariationOrchestrator};
pub use prompts::build_prompt;
pub use providers::{ImageTransport, ModelResponse, ResponsePart};
pub use settings::{AspectRatio, Preset, PresetOptions, StudioSettings};
