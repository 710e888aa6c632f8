use thiserror::Error;

/// Failures of the hierarchy construction step. Each one aborts the
/// layout of a single trace only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HierarchyError {
    #[error("no valid records to build a hierarchy from")]
    EmptyHierarchy,
    #[error("cannot pick a root: {} implied roots {:?}", implied.len(), implied)]
    AmbiguousRoot { implied: Vec<String> },
    #[error("record `{id}` is part of a cycle or its parent chain never reaches the root")]
    CycleOrOrphan { id: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("total value {declared} for node `{id}` is smaller than the sum of its children ({children_sum})")]
    InvalidTotalValue {
        id: String,
        declared: f64,
        children_sum: f64,
    },
}

/// Anything that makes one trace render nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Recoverable problems found while reading records. The offending
/// record is skipped and the build goes on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("record #{index} has an empty id and was dropped")]
    InvalidId { index: usize },
    #[error("record #{index} (`{id}`) has a missing, negative or non-finite value and was dropped")]
    InvalidValue { index: usize, id: String },
    #[error("record #{index} repeats id `{id}`; the first occurrence wins")]
    DuplicateId { index: usize, id: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown tiling strategy `{0}`")]
    UnknownTiling(String),
    #[error("unknown chart kind `{0}`")]
    UnknownKind(String),
    #[error("unknown branch value mode `{0}`")]
    UnknownBranchValues(String),
    #[error("`{field}` must be {expected}, got {got}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        got: f64,
    },
}
