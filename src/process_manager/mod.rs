// Subprocess management
pub mod python;
pub mod runner;

pub use python::get_python_path;
pub use runner::{CommandRunner, ProcessOutput, SystemRunner};
