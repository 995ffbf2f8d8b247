use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Coarse error taxonomy, stable across message changes.
///
/// Callers (and tests) branch on this rather than on rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing user input; recoverable by correcting the input.
    Config,
    /// Two selected bundles are mutually exclusive.
    Composition,
    /// Unsatisfiable dependency version ranges.
    Dependency,
    /// Template/variable mismatch; a catalog defect, always fatal.
    Render,
    /// Disk or permission failure.
    Io,
    /// The catalog itself is missing or malformed.
    Catalog,
    /// The run was cancelled externally.
    Interrupted,
}

#[derive(Debug, Error, Diagnostic)]
pub enum FormworkError {
    #[error("Unknown platform '{value}'")]
    #[diagnostic(help(
        "Valid platforms: mobile, frontend, backend-api, infrastructure, fullstack"
    ))]
    UnknownPlatform { value: String },

    #[error("No base bundle for platform '{platform}' with framework '{framework}'")]
    #[diagnostic(help("Run `formwork list` to see the available platform/framework pairs"))]
    UnknownFramework { platform: String, framework: String },

    #[error("Unknown feature '{feature}'")]
    #[diagnostic(help("Run `formwork list` to see the available features"))]
    UnknownFeature { feature: String },

    #[error("Feature '{feature}' does not apply to {platform}/{framework}")]
    IncompatibleFeature {
        feature: String,
        platform: String,
        framework: String,
    },

    #[error("Target directory already contains a generated project: {path}")]
    #[diagnostic(help("Use update mode to regenerate, or --force to overwrite"))]
    AlreadyGenerated { path: PathBuf },

    #[error("Target directory is not a generated project: {path}")]
    #[diagnostic(help("Update mode requires a prior create run in the target directory"))]
    NotAProject { path: PathBuf },

    #[error("Missing required variables: {}", names.join(", "))]
    #[diagnostic(help("Supply values with -d name=value"))]
    MissingVariables { names: Vec<String> },

    #[error("Bundles '{first}' and '{second}' conflict")]
    #[diagnostic(help("Drop one of the two features; they cannot be combined"))]
    BundleConflict { first: String, second: String },

    #[error("File '{path}' is owned by the dependency resolver but also declared by bundle '{bundle}'")]
    ManifestPathCollision { path: String, bundle: String },

    #[error(
        "Unsatisfiable version ranges for {ecosystem} package '{name}': {}",
        ranges.join(" vs ")
    )]
    DependencyConflict {
        ecosystem: String,
        name: String,
        ranges: Vec<String>,
    },

    #[error("Unresolved placeholder '{{{{{name}}}}}' in {file}")]
    #[diagnostic(help("The catalog template references a variable no selected bundle declares"))]
    UnknownPlaceholder { file: String, name: String },

    #[error("Refusing to overwrite existing file: {path}")]
    #[diagnostic(help("Use --force to overwrite files already present in the target directory"))]
    FileExists { path: PathBuf },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Catalog directory not found: {path}")]
    CatalogNotFound { path: PathBuf },

    #[error("Failed to parse bundle manifest {path}")]
    #[diagnostic(help("Check the TOML syntax in bundle.toml"))]
    BundleManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid bundle '{id}': {reason}")]
    InvalidBundle { id: String, reason: String },

    #[error("Invalid version range '{range}' for package '{name}'")]
    InvalidVersionRange {
        name: String,
        range: String,
        #[source]
        source: semver::Error,
    },

    #[error("Glob pattern error: {pattern}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to parse generation manifest at {path}")]
    #[diagnostic(help("The .formwork-manifest.toml file is corrupt; re-create the project"))]
    SidecarParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FormworkError {
    pub fn kind(&self) -> ErrorKind {
        use FormworkError::*;
        match self {
            UnknownPlatform { .. }
            | UnknownFramework { .. }
            | UnknownFeature { .. }
            | IncompatibleFeature { .. }
            | AlreadyGenerated { .. }
            | NotAProject { .. }
            | MissingVariables { .. } => ErrorKind::Config,
            BundleConflict { .. } | ManifestPathCollision { .. } => ErrorKind::Composition,
            DependencyConflict { .. } => ErrorKind::Dependency,
            UnknownPlaceholder { .. } => ErrorKind::Render,
            FileExists { .. } | Io { .. } | SidecarParse { .. } => ErrorKind::Io,
            Cancelled => ErrorKind::Interrupted,
            CatalogNotFound { .. }
            | BundleManifestParse { .. }
            | InvalidBundle { .. }
            | InvalidVersionRange { .. }
            | GlobPattern { .. } => ErrorKind::Catalog,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FormworkError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormworkError>;
