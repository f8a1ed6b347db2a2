//! Domain types, collaborator traits and configuration shared by the
//! ragqa crates.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! into typed [`config::Settings`].

pub mod collection;
pub mod config;
pub mod dataset;
pub mod error;
pub mod prompt;
pub mod timing;
pub mod traits;
pub mod types;

pub use collection::InMemoryCollection;
pub use dataset::GenericQaDataset;
pub use timing::TimingLog;
