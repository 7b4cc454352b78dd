//! Collaborative pixel quilt.
//!
//! A grid of small square canvases shared through a realtime key-value
//! store.  The library holds the model, the editing algorithms, the
//! interaction state machines, the store clients and the maintenance
//! operations; the binary adds the egui front end and the operator CLI.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod app;
pub mod cache;
pub mod cli;
pub mod color;
pub mod components;
pub mod config;
pub mod error;
pub mod grid;
pub mod maintenance;
pub mod ops;
pub mod session;
pub mod snapshot;
pub mod store;

pub use color::Color;
pub use error::{QuiltError, Result};
pub use grid::{PixelGrid, Quilt, QuiltLayout};
pub use session::{QuiltSession, SessionOptions};
pub use store::QuiltStore;
