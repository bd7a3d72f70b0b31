//! Data-driven action content and loaders.
//!
//! This crate houses the bundled action data and the loaders that turn RON/TOML
//! files into engine types:
//! - Action definitions with their phase tables (data-driven via RON)
//! - Per-level parameter tables (data-driven via RON)
//! - Action system tuning (data-driven via TOML)
//! - Code hooks for abilities that need more than data can express
//!
//! Every loaded definition becomes an [`action_core::ActionTemplate`] shared
//! through an [`ActionCatalog`].

pub mod abilities;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use abilities::{CryoseismHooks, install};

#[cfg(feature = "loaders")]
pub use loaders::{ActionCatalog, ConfigLoader, ContentFactory, LevelTableLoader, LoadResult};
