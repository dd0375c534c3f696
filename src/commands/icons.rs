// Icon generation command
use super::GENERATION_SLOT;
use crate::generator::IconGenerator;
use crate::models::{AppConfig, GenerationRequest, GenerationResult};
use log::{debug, error};

/// Generate icons with a generator built from `config`.
pub async fn generate_icon(config: AppConfig, request: GenerationRequest) -> Result<GenerationResult, String> {
    generate_icon_with(IconGenerator::new(&config), request).await
}

/// Generate icons on a blocking worker thread.
pub async fn generate_icon_with(
    mut generator: IconGenerator,
    request: GenerationRequest,
) -> Result<GenerationResult, String> {
    let _slot = GENERATION_SLOT.acquire("icon generation")?;
    debug!("Generating {} icon(s) for '{}'", request.effective_count(), request.prompt);

    let result = tokio::task::spawn_blocking(move || generator.generate(&request))
        .await
        .map_err(|e| format!("Generation task failed: {}", e))?;

    result.map_err(|e| {
        error!("Icon generation failed: {}", e);
        e.to_string()
    })
}
