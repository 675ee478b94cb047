//! Street network art: geocode a place, download its streets from
//! OpenStreetMap and render them colored by segment length.

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod geocode;
pub mod model;
pub mod notice;
pub mod pipeline;
pub mod session;
pub mod style;

#[cfg(test)]
mod testing;

pub use error::{MapError, StatusOr};
