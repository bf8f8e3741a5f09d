//! Repository mutations and output rendering
//!
//! Every mutation is an `impl Repository` block under `porcelain`. Each one
//! holds the index lock from rehydrate to write-back.

pub mod porcelain;
