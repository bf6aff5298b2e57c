//! Narrative Compiler: story-graph compilation, link validation, and
//! localized text resolution for branching narrative content.
//!
//! Authored chapter and puzzle-case records are compiled into a validated
//! runtime representation, checked for link integrity across perspective
//! tracks, and summarized into a manifest. Independently, user-facing text
//! is resolved across the shipped languages with deterministic fallback.

pub mod core;
pub mod schema;
