// Python script packaging
pub mod command;
pub mod deps;
pub mod environment;
pub mod pipeline;
pub mod stdlib;

pub use command::{CommandBuilder, PYINSTALLER_MODULE};
pub use deps::{DependencyResolver, ResolveStrategy, ResolvedDeps};
pub use environment::{EnvGuard, ProvisionState, Provisioner, VenvProvisioner};
pub use pipeline::{BuildPipeline, ProvisionerFactory};
