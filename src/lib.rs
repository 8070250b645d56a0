//! Storyloom — procedural chapter generation for long-running interactive fiction.
//!
//! Produces thousands of chapters from finite pools of reusable fragments,
//! quest templates and world events while bounding repetition, tracking
//! character relationships and following a branching narrative graph.
//! Generation is driven incrementally by a host-agnostic scheduler.

pub mod core;
pub mod schema;
