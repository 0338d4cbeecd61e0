// evo-monitor library: sources, dedup state, notification, digest persistence
// and git publishing. Shared by the `evo-digest` CLI and `evo-monitord`.

pub mod action_output;
pub mod config;
pub mod fetch;
pub mod git;
pub mod notify;
pub mod persist;
pub mod pipeline;
pub mod schedule;
pub mod sources;
pub mod state;
