pub mod config;
pub mod content;
pub mod context;
pub mod events;
pub mod graph;
pub mod persistence;
pub mod pipeline;
pub mod pool;
pub mod quest;
pub mod relationship;
pub mod scheduler;
pub mod template;
pub mod title;
