//! Theme presets and hook types served by the backend, plus the prompt
//! rendering used to turn a theme into one request per hook.

use serde::{Deserialize, Serialize};

use crate::request::{GenerationRequest, ModelId};

/// Placeholder substituted in a theme's prompt template.
pub const SOUND_TYPE_PLACEHOLDER: &str = "{sound_type}";

/// Theme preset for sound generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemePreset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prompt_template: String,
    pub icon: String,
}

/// Hook event a sound can be attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub sound_character: String,
    pub suggested_duration: f32,
}

/// Substitute `{sound_type}` in a theme template.
pub fn render_prompt(template: &str, sound_type: &str) -> String {
    template.replace(SOUND_TYPE_PLACEHOLDER, sound_type)
}

/// Build one request per hook from a theme.
///
/// The hook's sound character fills the template and its suggested
/// duration is used unless `duration` overrides it. Durations are capped
/// at the model's limit.
pub fn plan_batch(
    theme: &ThemePreset,
    hooks: &[HookType],
    model: ModelId,
    duration: Option<f32>,
) -> Vec<GenerationRequest> {
    hooks
        .iter()
        .map(|hook| {
            let prompt = render_prompt(&theme.prompt_template, &hook.sound_character.to_lowercase());
            let duration = duration
                .unwrap_or(hook.suggested_duration)
                .min(model.max_duration_secs());
            GenerationRequest::new(model, prompt, hook.id.clone()).with_duration(duration)
        })
        .collect()
}
