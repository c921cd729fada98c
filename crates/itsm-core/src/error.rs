use std::fmt;

use crate::model::EntityKind;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    DatasetParseError,
    EntityNotFound,
    CircularReference,
    AlreadyLinked,
    InvalidSelfReference,
    IntegrityViolation,
    DatasetWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::DatasetParseError => "E1004",
            Self::EntityNotFound => "E2001",
            Self::CircularReference => "E2003",
            Self::AlreadyLinked => "E2006",
            Self::InvalidSelfReference => "E2007",
            Self::IntegrityViolation => "E3003",
            Self::DatasetWriteFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Dataset not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::DatasetParseError => "Dataset file parse error",
            Self::EntityNotFound => "Entity not found",
            Self::CircularReference => "Circular parent reference",
            Self::AlreadyLinked => "Already linked",
            Self::InvalidSelfReference => "Entity cannot reference itself",
            Self::IntegrityViolation => "Relationship integrity violation",
            Self::DatasetWriteFailed => "Dataset write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `itsm init` to write the demo dataset."),
            Self::ConfigParseError => Some("Fix syntax in .itsm/config.toml and retry."),
            Self::DatasetParseError => Some("Fix the dataset JSON or re-run `itsm init --force`."),
            Self::EntityNotFound => {
                Some("Check the ID; `itsm show` lists what an incident links to.")
            }
            Self::CircularReference => {
                Some("Pick a parent outside this incident's subtree (see `itsm candidates`).")
            }
            Self::AlreadyLinked => None,
            Self::InvalidSelfReference => Some("Choose a different target ID."),
            Self::IntegrityViolation => Some("Run `itsm check` and repair the reported links."),
            Self::DatasetWriteFailed => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How loudly a rejected operation should be surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// User-correctable; nothing was wrong with the data.
    Warning,
    Error,
}

/// Why a link operation was rejected. State is unchanged whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("{kind} not found: '{id}'")]
    NotFound { kind: EntityKind, id: String },

    #[error("'{target}' is already linked to '{incident}'")]
    AlreadyLinked { incident: String, target: String },

    #[error("'{id}' cannot be linked to itself")]
    InvalidSelfReference { id: String },

    #[error("setting '{parent}' as parent of '{child}' would create a circular reference")]
    CircularReference { child: String, parent: String },
}

impl LinkError {
    pub(crate) fn not_found(kind: EntityKind, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_linked(incident: &str, target: &str) -> Self {
        Self::AlreadyLinked {
            incident: incident.to_string(),
            target: target.to_string(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::EntityNotFound,
            Self::AlreadyLinked { .. } => ErrorCode::AlreadyLinked,
            Self::InvalidSelfReference { .. } => ErrorCode::InvalidSelfReference,
            Self::CircularReference { .. } => ErrorCode::CircularReference,
        }
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::AlreadyLinked { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::DatasetParseError,
            ErrorCode::EntityNotFound,
            ErrorCode::CircularReference,
            ErrorCode::AlreadyLinked,
            ErrorCode::InvalidSelfReference,
            ErrorCode::IntegrityViolation,
            ErrorCode::DatasetWriteFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CircularReference.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn link_error_display_names_both_ids() {
        let e = LinkError::CircularReference {
            child: "INC-002".to_string(),
            parent: "INC-001".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("INC-001"));
        assert!(s.contains("INC-002"));
        assert!(s.contains("circular"));
    }

    #[test]
    fn not_found_display_names_kind() {
        let e = LinkError::not_found(EntityKind::Change, "CHG-999");
        assert_eq!(e.to_string(), "change not found: 'CHG-999'");
        assert_eq!(e.code(), ErrorCode::EntityNotFound);
    }

    #[test]
    fn only_already_linked_is_a_warning() {
        assert_eq!(
            LinkError::already_linked("INC-001", "CHG-456").severity(),
            Severity::Warning
        );
        assert_eq!(
            LinkError::InvalidSelfReference {
                id: "INC-001".to_string()
            }
            .severity(),
            Severity::Error
        );
    }
}
