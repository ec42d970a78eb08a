//! Inference report and assignment fingerprint

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use strata_core::{DeclKind, ElementStore, Type};

use crate::error::InferenceError;
use crate::resolver::TypeTable;

/// Why a declaration kept its unknown type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    NoInitializer,
    /// The initializer resolved to dynamic or to a still-unknown peer
    Uninformative,
    /// The initializer resolved to `null` or `throw`
    Bottom,
    /// The overridden member is dynamic or bottom, and the declaration cannot
    /// fall back to a type of its own
    DynamicOverride,
    NoUsableOverride,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclineReason::NoInitializer => "no initializer",
            DeclineReason::Uninformative => "uninformative",
            DeclineReason::Bottom => "bottom",
            DeclineReason::DynamicOverride => "dynamic override",
            DeclineReason::NoUsableOverride => "no usable override",
        };
        write!(f, "{}", s)
    }
}

/// Where a declaration's final type came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InferenceSource {
    Declared,
    Initializer,
    Override { ancestor: String },
    Declined { reason: DeclineReason },
}

impl InferenceSource {
    pub fn is_inferred(&self) -> bool {
        matches!(self, InferenceSource::Initializer | InferenceSource::Override { .. })
    }
}

impl fmt::Display for InferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceSource::Declared => write!(f, "declared"),
            InferenceSource::Initializer => write!(f, "initializer"),
            InferenceSource::Override { ancestor } => write!(f, "override of {}", ancestor),
            InferenceSource::Declined { reason } => write!(f, "declined: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// `x`, `Class.x`, or `Class.method(param)` for parameters
    pub name: String,
    pub kind: DeclKind,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(flatten)]
    pub source: InferenceSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceReport {
    /// One record per processed declaration, in processing order
    pub records: Vec<InferenceRecord>,
    /// Initializer components, dependencies first
    pub components: Vec<Vec<String>>,
    /// Class visit order of the hierarchy walk
    pub class_order: Vec<String>,
    pub edges: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_types: Option<TypeTable>,
}

impl InferenceReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, kind: DeclKind, ty: Type, source: InferenceSource) {
        let name = name.into();
        match &source {
            InferenceSource::Declined { reason } => {
                tracing::debug!("Declined {} {}: {}", kind, name, reason)
            }
            source => tracing::debug!("Resolved {} {}: {} ({})", kind, name, ty, source),
        }
        self.records.push(InferenceRecord {
            name,
            kind,
            ty,
            source,
        });
    }

    /// Last record for `name`
    pub fn get(&self, name: &str) -> Option<&InferenceRecord> {
        self.records.iter().rev().find(|r| r.name == name)
    }

    pub fn inferred(&self) -> impl Iterator<Item = &InferenceRecord> {
        self.records.iter().filter(|r| r.source.is_inferred())
    }

    pub fn declined(&self) -> impl Iterator<Item = &InferenceRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.source, InferenceSource::Declined { .. }))
    }

    pub fn to_json(&self) -> Result<String, InferenceError> {
        serde_json::to_string_pretty(self).map_err(|e| InferenceError::Export(e.to_string()))
    }

    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<(), InferenceError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| InferenceError::Export(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Exported inference report to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for InferenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "components:")?;
        for component in &self.components {
            writeln!(f, "  [{}]", component.join(", "))?;
        }
        writeln!(f, "classes: {}", self.class_order.join(", "))?;
        writeln!(f, "declarations:")?;
        for record in &self.records {
            writeln!(f, "  {}: {} ({})", record.name, record.ty, record.source)?;
        }
        Ok(())
    }
}

/// Hash of every declaration's current type, in store order
pub fn fingerprint(store: &ElementStore) -> String {
    let mut hasher = Sha256::new();
    for decl in store.declarations() {
        hasher.update(store.qualified_name(decl.id).as_bytes());
        hasher.update(b":");
        hasher.update(decl.current_type.to_string().as_bytes());
        if let Some(signature) = &decl.signature {
            for param in &signature.params {
                hasher.update(b",");
                hasher.update(param.current_type.to_string().as_bytes());
            }
        }
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
