// Prompt templating and resolution coercion

use crate::models::{ImageModel, Resolution};
use log::debug;
use std::collections::BTreeMap;

/// The one named slot a template may contain.
pub const PROMPT_SLOT: &str = "{prompt}";

/// Resolution substituted when the primary model is asked for a size it
/// does not support.
pub const FALLBACK_RESOLUTION: Resolution = Resolution::Square1024;

pub fn builtin_templates() -> BTreeMap<String, String> {
    [
        (
            "flat",
            "Flat minimalist app icon of {prompt}, bold simple shapes, solid colors, centered, no text",
        ),
        (
            "glyph",
            "Single-color glyph icon of {prompt}, clean outline, high contrast, transparent background",
        ),
        (
            "3d",
            "Glossy 3D rendered app icon of {prompt}, soft studio lighting, rounded square base",
        ),
        (
            "pixel",
            "Pixel art app icon of {prompt}, 32x32 style, limited palette, crisp edges",
        ),
        (
            "ios",
            "iOS style app icon of {prompt}, smooth gradient background, subtle depth, rounded corners",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Assemble the final prompt text.
///
/// A known template key wraps the prompt; an unknown key is ignored and the
/// raw prompt is used. Non-blank keywords are appended comma-joined.
pub fn build_prompt(
    prompt: &str,
    template: Option<&str>,
    templates: &BTreeMap<String, String>,
    keywords: &[String],
) -> String {
    let prompt = prompt.trim();
    let mut text = match template.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => match templates.get(key) {
            Some(format) => format.replace(PROMPT_SLOT, prompt),
            None => {
                debug!("Unknown prompt template '{}', using raw prompt", key);
                prompt.to_string()
            }
        },
        None => prompt.to_string(),
    };

    let extra: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if !extra.is_empty() {
        text.push_str(", ");
        text.push_str(&extra.join(", "));
    }
    text
}

/// Replace a resolution the primary model cannot produce with the default.
///
/// Other models are passed through untouched and left to the provider.
pub fn coerce_resolution(model: &ImageModel, requested: Resolution) -> Resolution {
    if *model != ImageModel::PRIMARY {
        return requested;
    }
    match model.supported_resolutions() {
        Some(supported) if !supported.contains(&requested) => {
            debug!(
                "{} does not support {}, using {}",
                model, requested, FALLBACK_RESOLUTION
            );
            FALLBACK_RESOLUTION
        }
        _ => requested,
    }
}
