//! Lookout - object detection and voice interaction toolkit
//!
//! Lookout bundles two inference utilities behind one library:
//! 1. Object detection - a pure-Rust YOLOv3 forward pass over darknet
//!    weights, with decoding, suppression, annotation and reporting
//! 2. Voice interaction - transcription and synthesis engines behind trait
//!    seams, with a silence-aware exchange loop and spoken detection
//!    announcements
//!
//! # Architecture
//!
//! The crate is layered bottom-up:
//! - `image` / `audio`: buffer types and file I/O with no model knowledge
//! - `vision`: network construction, weight loading, decoding, suppression
//! - `speech`: engine traits, mock and bridge implementations, registry
//! - `pipeline`: detector, announcer, voice loop and frame watching
//! - `cli`: the lookout binary's commands

pub mod audio;
pub mod cli;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod speech;
pub mod vision;

pub use error::{LookoutError, Result};
