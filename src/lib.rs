#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # Face Match Studio
//!
//! A small web service with two modes built on pretrained models:
//!
//! - **Animal look-alike**: embeds an uploaded photo with CLIP, ranks it
//!   against a curated animal catalog by cosine similarity and reads a
//!   "personality" from text prompts.
//! - **Presentation practice**: classifies webcam frames with a FER+ emotion
//!   model, turns each distribution into a confidence score, and summarises
//!   a session into feedback, best moments and a timeline chart.
//!
//! The models sit behind the [`EmbeddingProvider`] and
//! [`EmotionClassifier`] traits; the ranking, scoring and aggregation in
//! [`core`] are plain functions over their outputs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use facematch::core::emotion::{score_confidence, EmotionScores};
//!
//! let scores = EmotionScores { neutral: 100.0, ..Default::default() };
//! assert_eq!(score_confidence(&scores), 75.0);
//! ```

#[cfg(feature = "web")]
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
mod state;
mod utils;

/// Build-time package information.
pub mod built_info {
    #![allow(missing_docs, unreachable_pub, dead_code)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        catalog::{Catalog, CatalogCache, CatalogEntry, Category},
        embeddings::{Embedding, EmbeddingProvider},
        emotion::{EmotionClassifier, EmotionReading, EmotionScores},
    },
    error::{AppError, Result, ResultExt},
    state::{AppState, Config},
};

#[cfg(feature = "web")]
pub use crate::api::create_router;

#[cfg(feature = "onnx")]
pub use crate::core::{embeddings::ClipEmbedder, emotion::FerPlusClassifier};

/// Initialize logging and load `.env`.
///
/// Call once, early in startup, before [`Config::from_env`].
pub fn init() -> Result<()> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .init();

    if dotenv_loaded {
        log::debug!("Loaded environment from .env");
    }
    log::info!(
        "Initializing {} {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION
    );

    Ok(())
}
