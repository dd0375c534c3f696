// Packaging command
use super::BUILD_SLOT;
use crate::models::{BuildReport, PackagingOptions, PipelineEvent};
use crate::packer::BuildPipeline;
use log::{debug, error};
use tokio::sync::mpsc;

/// Run one build on a blocking worker thread, streaming events to `events`.
///
/// A second call while a build is running is rejected. A failed build is
/// still `Ok`: inspect `BuildReport::state`.
pub async fn pack_script(
    mut pipeline: BuildPipeline,
    options: PackagingOptions,
    events: mpsc::Sender<PipelineEvent>,
) -> Result<BuildReport, String> {
    let _slot = BUILD_SLOT.acquire(&options.script_path.to_string_lossy())?;
    debug!("Starting build for {:?}", options.script_path);

    let result = tokio::task::spawn_blocking(move || {
        pipeline.run(options, &mut |event| {
            // A dropped receiver only means nobody is listening.
            let _ = events.blocking_send(event);
        })
    })
    .await
    .map_err(|e| format!("Build task failed: {}", e))?;

    result.map_err(|e| {
        error!("Build rejected: {}", e);
        e.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppConfig;
    use crate::packer::ResolveStrategy;

    #[tokio::test]
    async fn test_missing_script_is_rejected() {
        let pipeline = BuildPipeline::new(&AppConfig::default(), ResolveStrategy::Static);
        let (tx, mut rx) = mpsc::channel(16);

        let err = pack_script(pipeline, PackagingOptions::new("/no/such/dir/app.py"), tx)
            .await
            .unwrap_err();

        assert!(err.contains("script not found"));
        assert!(rx.recv().await.is_none());
        assert!(!BUILD_SLOT.is_busy());
    }
}
