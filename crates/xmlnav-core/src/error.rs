use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is not well-formed XML. `line`/`column` are 1-based, or 0 when the parser that
    /// failed did not report a position.
    #[error("XML parse error{}: {message}", position_suffix(*line, *column))]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("tree build failed: {message}")]
    TreeBuild { message: String },

    #[error("Invalid rule type: {rule_type}")]
    InvalidRuleType { rule_type: String },

    #[error("Invalid criteria for {rule_type} rule: {criteria:?}")]
    InvalidRuleCriteria { rule_type: String, criteria: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a split project: {}", path.display())]
    NotASplitProject { path: PathBuf },

    #[error("No part is mapped to {path}")]
    UnknownPart { path: String },
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Line/column of a parse failure, when known.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Parse { line, column, .. } if *line > 0 => Some((*line, *column)),
            _ => None,
        }
    }
}

fn position_suffix(line: usize, column: usize) -> String {
    match (line, column) {
        (0, _) => String::new(),
        (l, 0) => format!(" at line {l}"),
        (l, c) => format!(" at line {l}, column {c}"),
    }
}
