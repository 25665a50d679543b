//! HTML Tools
//!
//! Text-level helpers shared by the probes and extractors: tag stripping,
//! title extraction, word counts, and the bot-challenge classifier.

mod utils;

pub use utils::*;
