// Remote icon generation
pub mod client;
pub mod materialize;
pub mod prompt;
pub mod retry;
pub mod transport;

pub use client::IconGenerator;
pub use prompt::{build_prompt, builtin_templates, coerce_resolution};
pub use retry::RetryPolicy;
pub use transport::{ChatApi, ImageApi, ImageData, ImagesRequest, ImagesResponse, OpenAiHttp};
