//! Model name resolution and the static model catalogue.
//!
//! Clients may ask for Anthropic model names, GitHub Models names, or anything
//! else. Resolution is a pure table lookup that never fails: unknown names are
//! forwarded unchanged and the provider decides.

use serde::{Deserialize, Serialize};

/// Provider ceiling for `max_tokens`; requests above it are clamped.
pub const MAX_TOKENS_LIMIT: u64 = 16_384;

/// Anthropic model names and the GitHub Models identifier each maps to.
pub const MODEL_MAP: &[(&str, &str)] = &[
    ("claude-3-5-sonnet-20241022", "gpt-4o"),
    ("claude-3-5-sonnet-latest", "gpt-4o"),
    ("claude-3-opus-20240229", "gpt-4o"),
    ("claude-3-sonnet-20240229", "gpt-4o"),
    ("claude-3-haiku-20240307", "gpt-4o-mini"),
    ("claude-sonnet-4-20250514", "gpt-4o"),
    ("claude-opus-4-20250514", "gpt-4o"),
];

/// Identifiers GitHub Models serves directly.
pub const NATIVE_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "o1",
    "o1-mini",
    "o1-preview",
    "o3-mini",
    "Phi-4",
    "Mistral-large-2411",
    "DeepSeek-R1",
];

/// Resolve a client-supplied model name to the provider's identifier.
///
/// Lookup order: mapped Anthropic name, then native allow-list (returned
/// as-is), then passthrough of the input.
#[must_use]
pub fn resolve_model(requested: &str) -> &str {
    if let Some((_, target)) = MODEL_MAP.iter().find(|(name, _)| *name == requested) {
        return *target;
    }
    if let Some(native) = NATIVE_MODELS.iter().find(|name| **name == requested) {
        return *native;
    }
    requested
}

#[must_use]
pub fn clamp_max_tokens(requested: u64) -> u64 {
    requested.min(MAX_TOKENS_LIMIT)
}

#[must_use]
pub fn is_mapped_model(id: &str) -> bool {
    MODEL_MAP.iter().any(|(name, _)| *name == id)
}

/// Which table a listed model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOwner {
    Github,
    Anthropic,
}

/// An entry of the OpenAI-style `/v1/models` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: ModelOwner,
}

impl ModelEntry {
    fn new(id: &str, created: i64, owned_by: ModelOwner) -> Self {
        Self {
            id: id.to_string(),
            object: "model".to_string(),
            created,
            owned_by,
        }
    }

    /// Describe any model id; ownership follows the Anthropic map.
    #[must_use]
    pub fn describe(id: &str, created: i64) -> Self {
        let owner = if is_mapped_model(id) {
            ModelOwner::Anthropic
        } else {
            ModelOwner::Github
        };
        Self::new(id, created, owner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

/// Native models first, then the mapped Anthropic names, each in table order.
#[must_use]
pub fn list_models(created: i64) -> ModelList {
    let native = NATIVE_MODELS
        .iter()
        .map(|id| ModelEntry::new(id, created, ModelOwner::Github));
    let mapped = MODEL_MAP
        .iter()
        .map(|(id, _)| ModelEntry::new(id, created, ModelOwner::Anthropic));

    ModelList {
        object: "list".to_string(),
        data: native.chain(mapped).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_anthropic_names() {
        assert_eq!(resolve_model("claude-3-5-sonnet-latest"), "gpt-4o");
        assert_eq!(resolve_model("claude-3-haiku-20240307"), "gpt-4o-mini");
        assert_eq!(resolve_model("claude-sonnet-4-20250514"), "gpt-4o");
        assert_eq!(resolve_model("claude-opus-4-20250514"), "gpt-4o");
    }

    #[test]
    fn test_native_names_pass_through() {
        for name in ["gpt-4o", "gpt-4o-mini", "DeepSeek-R1", "o3-mini"] {
            assert_eq!(resolve_model(name), name);
        }
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(resolve_model("some-future-model"), "some-future-model");
        assert_eq!(resolve_model(""), "");
        // Lookup is exact, not case-insensitive
        assert_eq!(resolve_model("GPT-4O"), "GPT-4O");
    }

    #[test]
    fn test_every_mapped_target_is_native() {
        for (name, target) in MODEL_MAP {
            assert!(NATIVE_MODELS.contains(target), "{name} maps to unknown {target}");
        }
    }

    #[test]
    fn test_clamp_max_tokens() {
        let cases = [
            (0, 0),
            (1, 1),
            (4096, 4096),
            (16_384, 16_384),
            (16_385, 16_384),
            (u64::MAX, 16_384),
        ];
        for (requested, expected) in cases {
            assert_eq!(clamp_max_tokens(requested), expected);
        }
    }

    #[test]
    fn test_list_models_tags_owners() {
        let list = list_models(1_700_000_000);
        assert_eq!(list.object, "list");
        assert_eq!(list.data.len(), NATIVE_MODELS.len() + MODEL_MAP.len());
        assert_eq!(list.data[0].id, "gpt-4o");
        assert_eq!(list.data[0].owned_by, ModelOwner::Github);

        let last = list.data.last().unwrap();
        assert_eq!(last.owned_by, ModelOwner::Anthropic);
        assert!(list.data.iter().all(|m| m.object == "model" && m.created == 1_700_000_000));

        let json = serde_json::to_value(&list.data[0]).unwrap();
        assert_eq!(json["owned_by"], "github");
    }

    #[test]
    fn test_describe_model() {
        assert_eq!(
            ModelEntry::describe("claude-3-opus-20240229", 0).owned_by,
            ModelOwner::Anthropic
        );
        assert_eq!(ModelEntry::describe("gpt-4o", 0).owned_by, ModelOwner::Github);
        assert_eq!(ModelEntry::describe("anything-else", 0).owned_by, ModelOwner::Github);
    }
}
