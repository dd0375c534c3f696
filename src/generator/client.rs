// Icon generator: prompt assembly, remote calls and artifact materialization

use super::materialize::{decode_rgba, encode_png, icon_stems, to_base64, write_icon_files};
use super::prompt::{build_prompt, builtin_templates, coerce_resolution};
use super::retry::RetryPolicy;
use super::transport::{ImageApi, ImageData, ImagesRequest, OpenAiHttp};
use crate::error::{AiconError, Result, TransportError};
use crate::models::{AppConfig, GenerationRequest, GenerationResult, IconArtifact, OutputFormat};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Generates icons through a remote image API.
///
/// Construction never checks credentials. The API client is created by
/// [`IconGenerator::ensure_ready`], which `generate` calls first, so a
/// missing key surfaces as `AiconError::Configuration` on first use.
pub struct IconGenerator {
    config: AppConfig,
    api: Option<Arc<dyn ImageApi>>,
    injected: bool,
    retry: RetryPolicy,
}

impl IconGenerator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            api: None,
            injected: false,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Use a specific API implementation instead of the HTTP client.
    pub fn with_api(config: &AppConfig, api: Arc<dyn ImageApi>) -> Self {
        Self {
            api: Some(api),
            injected: true,
            ..Self::new(config)
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Apply a new configuration snapshot. A client built from the old
    /// snapshot is dropped so the next call picks up new credentials.
    pub fn apply_config(&mut self, config: &AppConfig) {
        self.config = config.clone();
        self.retry = RetryPolicy::from_config(config);
        if !self.injected {
            self.api = None;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.api.is_some()
    }

    /// Build the API client if needed. Fails when no API key is configured.
    pub fn ensure_ready(&mut self) -> Result<()> {
        if self.api.is_some() {
            return Ok(());
        }
        let key = self.config.api_key().ok_or_else(|| {
            AiconError::Configuration(
                "OPENAI_API_KEY is not set; add an API key to the config or environment".to_string(),
            )
        })?;
        let http = OpenAiHttp::new(
            &self.config.base_url,
            key,
            Duration::from_secs(self.config.timeout_secs.max(1)),
        )
        .map_err(|e| AiconError::Configuration(e.to_string()))?;
        self.api = Some(Arc::new(http));
        Ok(())
    }

    /// Built-in templates overlaid with the configured ones.
    pub fn templates(&self) -> BTreeMap<String, String> {
        let mut templates = builtin_templates();
        templates.extend(self.config.templates.clone());
        templates
    }

    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResult> {
        if request.prompt.trim().is_empty() {
            return Err(AiconError::Validation("icon prompt is empty".to_string()));
        }
        self.ensure_ready()?;
        let api = self
            .api
            .clone()
            .ok_or_else(|| AiconError::Configuration("image API not initialised".to_string()))?;

        let prompt = build_prompt(
            &request.prompt,
            request.template.as_deref(),
            &self.templates(),
            &request.keywords,
        );
        let size = coerce_resolution(&request.model, request.resolution);
        let count = request.effective_count();

        info!(
            "Generating {} icon(s) with {} at {}",
            count, request.model, size
        );
        debug!("Prompt: {}", prompt);

        let base = ImagesRequest {
            model: request.model.id().to_string(),
            prompt,
            n: 1,
            size: size.as_str().to_string(),
            response_format: request
                .model
                .accepts_response_format()
                .then(|| "url".to_string()),
        };

        let images = if request.model.single_image_per_call() {
            let mut images = Vec::with_capacity(count as usize);
            for _ in 0..count {
                images.extend(self.request_images(api.as_ref(), &base, 1)?);
            }
            images
        } else {
            self.request_images(api.as_ref(), &base, count)?
        };

        self.materialize(api.as_ref(), images, &request.output)
    }

    fn request_images(
        &self,
        api: &dyn ImageApi,
        base: &ImagesRequest,
        n: u32,
    ) -> Result<Vec<ImageData>> {
        let request = ImagesRequest { n, ..base.clone() };
        let response = self
            .retry
            .run("image generation", |_| api.create_images(&request))?;

        if response.data.len() != n as usize {
            return Err(AiconError::RemoteRequest(TransportError::Malformed(format!(
                "expected {} image(s), provider returned {}",
                n,
                response.data.len()
            ))));
        }
        Ok(response.data)
    }

    fn fetch_bytes(&self, api: &dyn ImageApi, image: &ImageData) -> Result<Vec<u8>> {
        match (&image.url, &image.b64_json) {
            (Some(url), _) => self.retry.run("image download", |_| api.download(url)),
            (None, Some(payload)) => BASE64.decode(payload.trim()).map_err(|e| {
                AiconError::RemoteRequest(TransportError::Malformed(format!(
                    "invalid base64 image payload: {}",
                    e
                )))
            }),
            (None, None) => Err(AiconError::RemoteRequest(TransportError::Malformed(
                "image entry has neither url nor b64_json".to_string(),
            ))),
        }
    }

    fn materialize(
        &self,
        api: &dyn ImageApi,
        images: Vec<ImageData>,
        output: &OutputFormat,
    ) -> Result<GenerationResult> {
        let stems = match output {
            OutputFormat::Path {
                filename_prefix, ..
            } => icon_stems(filename_prefix.as_deref(), images.len(), chrono::Local::now()),
            _ => Vec::new(),
        };

        let mut artifacts = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let bytes = self.fetch_bytes(api, image)?;
            let rgba = decode_rgba(&bytes)?;

            let artifact = match output {
                OutputFormat::Path {
                    output_dir,
                    compress_level,
                    write_ico,
                    ..
                } => write_icon_files(&rgba, output_dir, &stems[index], *compress_level, *write_ico)?,
                OutputFormat::Image => IconArtifact::Image(rgba),
                OutputFormat::Bytes { compress_level } => {
                    IconArtifact::Bytes(encode_png(&rgba, *compress_level)?)
                }
                OutputFormat::Base64 { compress_level } => {
                    IconArtifact::Base64(to_base64(&encode_png(&rgba, *compress_level)?))
                }
            };
            if let IconArtifact::Path { png, .. } = &artifact {
                info!("Saved icon {}", png.display());
            }
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::transport::ImagesResponse;
    use crate::models::{ImageModel, Resolution};
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(32, 32, Rgba([200, 40, 40, 255]));
        encode_png(&img, None).unwrap()
    }

    /// Scripted image API recording every request it receives.
    #[derive(Default)]
    struct FakeApi {
        requests: Mutex<Vec<ImagesRequest>>,
        failures: Mutex<VecDeque<TransportError>>,
        downloads: Mutex<Vec<String>>,
        inline: bool,
    }

    impl FakeApi {
        fn failing(failures: Vec<TransportError>) -> Self {
            Self {
                failures: Mutex::new(failures.into()),
                ..Self::default()
            }
        }
    }

    impl ImageApi for FakeApi {
        fn create_images(&self, request: &ImagesRequest) -> std::result::Result<ImagesResponse, TransportError> {
            self.requests.lock().push(request.clone());
            if let Some(err) = self.failures.lock().pop_front() {
                return Err(err);
            }
            let data = (0..request.n)
                .map(|i| {
                    if self.inline {
                        ImageData {
                            b64_json: Some(BASE64.encode(png_bytes())),
                            ..ImageData::default()
                        }
                    } else {
                        ImageData {
                            url: Some(format!("https://images.test/{}.png", i)),
                            ..ImageData::default()
                        }
                    }
                })
                .collect();
            Ok(ImagesResponse { data })
        }

        fn download(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError> {
            self.downloads.lock().push(url.to_string());
            Ok(png_bytes())
        }
    }

    fn generator(api: Arc<FakeApi>) -> IconGenerator {
        IconGenerator::with_api(&AppConfig::default(), api).with_retry_policy(RetryPolicy::immediate(3))
    }

    #[test]
    fn test_missing_key_fails_on_first_use_not_construction() {
        let mut gen = IconGenerator::new(&AppConfig::default());
        assert!(!gen.is_ready());
        let err = gen.ensure_ready().unwrap_err();
        assert!(matches!(err, AiconError::Configuration(_)));

        let request = GenerationRequest::new("blue calendar icon", OutputFormat::Image);
        assert!(matches!(gen.generate(&request), Err(AiconError::Configuration(_))));
    }

    #[test]
    fn test_key_makes_client_ready() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let mut gen = IconGenerator::new(&config);
        gen.ensure_ready().unwrap();
        assert!(gen.is_ready());

        gen.apply_config(&AppConfig::default());
        assert!(!gen.is_ready());
    }

    #[test]
    fn test_single_path_icon_has_alpha() {
        let temp = TempDir::new().unwrap();
        let api = Arc::new(FakeApi::default());
        let mut gen = generator(api.clone());

        let mut request = GenerationRequest::new("blue calendar icon", OutputFormat::path(temp.path()));
        request.resolution = Resolution::Square1024;
        let result = gen.generate(&request).unwrap();

        assert_eq!(result.len(), 1);
        let png = result[0].png_path().unwrap();
        assert!(png.is_file());
        let decoded = image::open(png).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(api.requests.lock()[0].size, "1024x1024");
    }

    #[test]
    fn test_unsupported_size_is_coerced_silently() {
        let api = Arc::new(FakeApi::default());
        let mut gen = generator(api.clone());

        let mut request = GenerationRequest::new("rocket", OutputFormat::Image);
        request.resolution = Resolution::Square256;
        gen.generate(&request).unwrap();

        assert_eq!(api.requests.lock()[0].size, "1024x1024");
    }

    #[test]
    fn test_single_image_model_makes_sequential_calls() {
        let temp = TempDir::new().unwrap();
        let api = Arc::new(FakeApi::default());
        let mut gen = generator(api.clone());

        let mut request = GenerationRequest::new(
            "rocket",
            OutputFormat::Path {
                output_dir: temp.path().to_path_buf(),
                filename_prefix: Some("rocket".into()),
                compress_level: None,
                write_ico: false,
            },
        );
        request.model = ImageModel::DallE3;
        request.count = 3;
        let result = gen.generate(&request).unwrap();

        let requests = api.requests.lock();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.n == 1));

        let names: Vec<String> = result
            .iter()
            .map(|a| a.png_path().unwrap().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["rocket_1.png", "rocket_2.png", "rocket_3.png"]);
    }

    #[test]
    fn test_batch_model_makes_one_clamped_call() {
        let api = Arc::new(FakeApi::default());
        let mut gen = generator(api.clone());

        let mut request = GenerationRequest::new("rocket", OutputFormat::Bytes { compress_level: None });
        request.model = ImageModel::DallE2;
        request.resolution = Resolution::Square512;
        request.count = 40;
        let result = gen.generate(&request).unwrap();

        let requests = api.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].n, 10);
        assert_eq!(requests[0].size, "512x512");
        assert_eq!(result.len(), 10);
        assert_eq!(api.downloads.lock().len(), 10);
    }

    #[test]
    fn test_inline_payloads_skip_download() {
        let api = Arc::new(FakeApi {
            inline: true,
            ..FakeApi::default()
        });
        let mut gen = generator(api.clone());

        let mut request = GenerationRequest::new("rocket", OutputFormat::Base64 { compress_level: None });
        request.model = ImageModel::GptImage1;
        let result = gen.generate(&request).unwrap();

        assert!(api.downloads.lock().is_empty());
        assert!(api.requests.lock()[0].response_format.is_none());
        match &result[0] {
            IconArtifact::Base64(text) => assert!(decode_rgba(&BASE64.decode(text).unwrap()).is_ok()),
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn test_transient_failures_then_success() {
        let api = Arc::new(FakeApi::failing(vec![
            TransportError::Status { code: 429, body: String::new() },
            TransportError::Network("reset".into()),
        ]));
        let mut gen = generator(api.clone());

        let request = GenerationRequest::new("rocket", OutputFormat::Image);
        let result = gen.generate(&request).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(api.requests.lock().len(), 3);
    }

    #[test]
    fn test_exhausted_budget_is_remote_unavailable() {
        let api = Arc::new(FakeApi::failing(vec![
            TransportError::Status { code: 503, body: String::new() };
            3
        ]));
        let mut gen = generator(api.clone());

        let request = GenerationRequest::new("rocket", OutputFormat::Image);
        let err = gen.generate(&request).unwrap_err();
        assert!(matches!(err, AiconError::RemoteUnavailable { attempts: 3, .. }));
    }

    #[test]
    fn test_bad_request_propagates_immediately() {
        let api = Arc::new(FakeApi::failing(vec![TransportError::Status {
            code: 400,
            body: "invalid prompt".into(),
        }]));
        let mut gen = generator(api.clone());

        let request = GenerationRequest::new("rocket", OutputFormat::Image);
        assert!(matches!(gen.generate(&request), Err(AiconError::RemoteRequest(_))));
        assert_eq!(api.requests.lock().len(), 1);
    }

    #[test]
    fn test_empty_prompt_is_rejected_before_any_call() {
        let api = Arc::new(FakeApi::default());
        let mut gen = generator(api.clone());

        let request = GenerationRequest::new("   ", OutputFormat::Image);
        assert!(matches!(gen.generate(&request), Err(AiconError::Validation(_))));
        assert!(api.requests.lock().is_empty());
    }
}
