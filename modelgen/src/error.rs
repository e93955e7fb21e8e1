//! Error and warning types.
//!
//! Fatal conditions are errors and abort a run. Non-fatal conditions are
//! [`Warning`]s: they are logged through `tracing` and collected on the
//! generated output, and generation continues.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error for loading and generating.
#[derive(Debug, Error)]
pub enum Error {
    /// Error loading a model document.
    #[error("Failed to load model: {0}")]
    Model(#[from] ModelError),

    /// Error reading an override file.
    #[error("Failed to read overrides: {0}")]
    Override(#[from] OverrideError),

    /// Fatal error during normalization or generation.
    #[error("Generation failed: {0}")]
    Generate(#[from] GenerateError),

    /// Error writing streamed output.
    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

/// Error loading a model document.
#[derive(Debug, Error)]
pub enum ModelError {
    /// IO error reading the document.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON for the model schema.
    #[error("Invalid model document: {0}")]
    Json(#[from] serde_json::Error),

    /// Two elements of the same kind share an id.
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    /// An element references an id that does not exist.
    #[error("{referrer} references unknown {kind} '{id}'")]
    UnknownReference {
        kind: &'static str,
        id: String,
        referrer: String,
    },
}

/// Error reading an override file.
#[derive(Debug, Error)]
pub enum OverrideError {
    /// IO error reading the file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An `override` directive without a key.
    #[error("Line {line}: override directive without a name")]
    MissingKey { line: usize },

    /// The same key is overridden twice.
    #[error("Line {line}: duplicate override for '{key}'")]
    Duplicate { key: String, line: usize },
}

/// Fatal error raised while normalizing or generating.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    /// A type value names neither a primitive nor a class of the model.
    #[error("Property value type '{type_value}' of {feature} can not be found")]
    UnknownTypeValue { feature: String, type_value: String },

    /// An attribute with neither a resolved type nor a primitive type.
    #[error("{feature} can not be written: it has no type")]
    UnresolvableAttribute { feature: String },

    /// An association end without a name reached association emission.
    #[error("Unnamed attribute in {class}")]
    UnnamedAttribute { class: String },

    /// A default value on an attribute whose kind takes no defaults.
    #[error("Unknown default value type: {feature}: {kind} = {value}")]
    UnknownValueType {
        feature: String,
        kind: String,
        value: String,
    },

    /// A default value literal that contradicts the declared kind.
    #[error("Default value of {feature} does not match type {kind}: {value}")]
    DefaultValueMismatch {
        feature: String,
        kind: String,
        value: String,
    },

    /// A super model declares the class but its language does not provide it.
    #[error("Type {class} found in model {language}, but not in generated model")]
    MissingGeneratedType { language: String, class: String },

    /// An enumeration without literals.
    #[error("Enumeration {enumeration} used by {feature} has no literals")]
    EmptyEnumeration { feature: String, enumeration: String },

    /// Generalizations loop back on themselves.
    #[error("Circular generalization detected: {}", .cycle.join(" -> "))]
    CircularGeneralization { cycle: Vec<String> },
}

/// Non-fatal diagnostic produced during generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A derived attribute without a type and without an override.
    DerivedWithoutImplementation { feature: String },

    /// An operation without an override.
    OperationWithoutImplementation { operation: String },

    /// A `subsets` slot names a feature that can not be found.
    SubsetUndefined { feature: String, target: String },

    /// A `subsets` slot names a feature that is not a derived union.
    SubsetNotDerivedUnion { feature: String, target: String },

    /// A `redefines` slot names a feature that can not be found.
    RedefinitionUnresolved { feature: String, target: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DerivedWithoutImplementation { feature } => {
                write!(f, "Derived attribute {} has no implementation.", feature)
            }
            Warning::OperationWithoutImplementation { operation } => {
                write!(f, "Operation {} has no implementation", operation)
            }
            Warning::SubsetUndefined { feature, target } => write!(
                f,
                "{} wants to subset {}, but it is not defined",
                feature, target
            ),
            Warning::SubsetNotDerivedUnion { feature, target } => write!(
                f,
                "{} wants to subset {}, but it is not a derived union",
                feature, target
            ),
            Warning::RedefinitionUnresolved { feature, target } => write!(
                f,
                "{} redefines {}, but it is not defined",
                feature, target
            ),
        }
    }
}

/// Collects warnings and reports each one through `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a warning.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
