// evo-digest-common: shared types and helpers for the evo-digest workspace

pub mod keywords;
pub mod layout;
pub mod types;
