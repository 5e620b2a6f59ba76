//! # Output Module
//!
//! Collects encoded chunks as backends emit them, concatenates them into a
//! single artifact, and writes that artifact to disk.

pub mod assembler;
pub mod collector;
pub mod download;

pub use assembler::{OutputArtifact, OutputAssembler};
pub use collector::{ChunkCollector, ChunkObserver, EncodedChunk};
pub use download::ArtifactWriter;
