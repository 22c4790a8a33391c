use thiserror::Error;

/// Structural problems found while turning a study graph into tables.
///
/// A render either produces complete tables or one of these; there is no
/// partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("vertex `{name}` is referenced by an arc but does not exist")]
    MissingVertex { name: String },

    #[error("vertex `{name}` is defined more than once")]
    DuplicateVertex { name: String },

    #[error("cycle detected at vertex `{name}`")]
    Cycle { name: String },

    #[error("row {row} contains no sample")]
    NoSample { row: usize },

    #[error("row {row} contains {count} samples, expected exactly one")]
    MultipleSamples { row: usize, count: usize },

    #[error("row {row} has its sample at position {found}, expected {expected}")]
    SampleIndexMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{table} table row {row} has {found} columns, expected {expected}")]
    ShapeMismatch {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{table} table row {row} column {column} is `{found}`, expected `{expected}`")]
    ColumnMismatch {
        table: String,
        row: usize,
        column: usize,
        expected: String,
        found: String,
    },
}

/// Reasons a stored sheet configuration cannot be used as-is.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no sheet configuration stored")]
    Missing,

    #[error("malformed sheet configuration: {0}")]
    Malformed(String),

    #[error("invalid configuration version `{0}`")]
    InvalidVersion(String),

    #[error("configuration version {found} is older than required {required}")]
    Outdated { found: String, required: String },

    #[error("invalid regex for field `{field}`: {source}")]
    InvalidRegex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("study `{0}` not found in configuration")]
    UnknownStudy(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid version `{value}` in {key}")]
    Version { key: &'static str, value: String },

    #[error("config_version {config} is below min_config_version {min}")]
    VersionOrder { config: String, min: String },
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
