//! Typed views of manifest JSON
//!
//! [`ManifestDefinition`] is the input side handed to a builder.
//! [`ManifestStore`] is the output side parsed from a reader's JSON report.
//! Both model only the fields callers commonly need; unknown fields are
//! ignored on input and assertion payloads stay as raw JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Label of the standard actions assertion.
pub const ACTIONS_ASSERTION_LABEL: &str = "c2pa.actions";

/// Software that produced a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimGeneratorInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ClaimGeneratorInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

/// A labelled assertion and its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionDefinition {
    pub label: String,
    pub data: serde_json::Value,
}

/// Reference to a binary resource staged with `Builder::add_resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub format: String,
    pub identifier: String,
}

/// Manifest input for a builder.
///
/// ```
/// use c2pa_bridge::ManifestDefinition;
///
/// let manifest = ManifestDefinition::new("my-app/1.0")
///     .with_title("Sunset")
///     .with_format("image/jpeg")
///     .with_created_action();
/// assert_eq!(manifest.assertions.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_generator: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claim_generator_info: Vec<ClaimGeneratorInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ResourceRef>,
}

impl ManifestDefinition {
    pub fn new(claim_generator: impl Into<String>) -> Self {
        Self {
            claim_generator: Some(claim_generator.into()),
            ..Self::default()
        }
    }

    pub fn with_claim_generator_info(mut self, info: ClaimGeneratorInfo) -> Self {
        self.claim_generator_info.push(info);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_assertion(mut self, label: impl Into<String>, data: serde_json::Value) -> Self {
        self.assertions.push(AssertionDefinition {
            label: label.into(),
            data,
        });
        self
    }

    /// Add a `c2pa.created` action attributed to the claim generator.
    pub fn with_created_action(self) -> Self {
        let agent = self.claim_generator.clone().unwrap_or_default();
        self.with_assertion(
            ACTIONS_ASSERTION_LABEL,
            serde_json::json!({
                "actions": [{
                    "action": "c2pa.created",
                    "digitalSourceType": "http://cv.iptc.org/newscodes/digitalsourcetype/digitalCapture",
                    "softwareAgent": agent
                }]
            }),
        )
    }

    pub fn with_thumbnail(mut self, format: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.thumbnail = Some(ResourceRef {
            format: format.into(),
            identifier: identifier.into(),
        });
        self
    }
}

/// Full manifest store reported by a reader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestStore {
    #[serde(default)]
    pub active_manifest: Option<String>,

    #[serde(default)]
    pub manifests: HashMap<String, Manifest>,

    /// Present only when validation found problems
    #[serde(default)]
    pub validation_status: Option<Vec<ValidationStatus>>,
}

impl ManifestStore {
    /// The manifest named by `active_manifest`.
    pub fn active(&self) -> Option<&Manifest> {
        self.active_manifest
            .as_deref()
            .and_then(|label| self.manifests.get(label))
    }

    /// Whether validation reported any claim or assertion failure.
    pub fn has_errors(&self) -> bool {
        self.validation_status
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(ValidationStatus::is_error)
    }
}

/// A single manifest within a store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub claim_generator: Option<String>,

    #[serde(default)]
    pub claim_generator_info: Vec<ClaimGeneratorInfo>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub assertions: Vec<AssertionDefinition>,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    #[serde(default)]
    pub thumbnail: Option<ResourceRef>,

    #[serde(default)]
    pub signature_info: Option<SignatureInfo>,
}

impl Manifest {
    /// First assertion carrying `label`.
    pub fn assertion(&self, label: &str) -> Option<&serde_json::Value> {
        self.assertions
            .iter()
            .find(|a| a.label == label)
            .map(|a| &a.data)
    }
}

/// An ingredient recorded in a manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ingredient {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureInfo {
    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub time: Option<String>,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationStatus {
    pub code: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub explanation: Option<String>,
}

impl ValidationStatus {
    pub fn is_error(&self) -> bool {
        self.code.starts_with("assertion") || self.code.starts_with("claim")
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code,
            self.explanation.as_deref().unwrap_or("Unknown")
        )
    }
}
