//! Output generation for post files and JSON state files.
//!
//! # Submodules
//!
//! - [`markdown`]: Derives front matter and renders post files
//! - [`json`]: Atomic writes for the topic bank, schedule and research feed
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── topics.json      # Topic bank (combine)
//! ├── schedule.json    # Schedule store (init, generate, note)
//! └── research.json    # Research feed (research)
//!
//! content/blog/
//! ├── normalization-of-deviance.md
//! └── ...
//! ```

pub mod json;
pub mod markdown;
