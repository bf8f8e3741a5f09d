//! Branch checkout
//!
//! A checkout plans every change before touching the disk: conflicts with
//! local modifications are all reported up front and nothing is written when
//! any exists.

pub mod conflict;
pub mod migration;
