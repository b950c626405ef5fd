//! Core matching, scoring and aggregation logic

/// Reference catalog and its one-time embedding cache.
pub mod catalog;
/// Timeline chart rendering.
pub mod chart;
/// Embedding vectors and the embedding provider seam.
pub mod embeddings;
/// Emotion distributions, confidence scoring and the classifier seam.
pub mod emotion;
/// Text-prompt personality scoring.
pub mod personality;
/// Catalog similarity ranking.
pub mod ranking;
/// Practice session aggregation.
pub mod session;

#[cfg(feature = "onnx")]
mod onnx;
