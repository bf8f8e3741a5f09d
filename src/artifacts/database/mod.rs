//! Database entry types
//!
//! Entries read out of committed trees, pairing an object id with its mode.

pub mod database_entry;
