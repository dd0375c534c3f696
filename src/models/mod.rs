// Data models (structs)
pub mod build_job;
pub mod generation;
pub mod packaging;
pub mod settings;

pub use build_job::*;
pub use generation::*;
pub use packaging::*;
pub use settings::*;
