// AIconPack core: AI icon generation and one-click PyInstaller packaging
pub mod commands;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod generator;
pub mod models;
pub mod packer;
pub mod process_manager;
pub mod utils;

pub use config::ConfigStore;
pub use error::{AiconError, Result, TransportError};
pub use generator::IconGenerator;
pub use packer::{BuildPipeline, CommandBuilder, DependencyResolver, ResolveStrategy};
