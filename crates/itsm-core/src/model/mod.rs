//! Ticket-like entities and their relation fields.
//!
//! IDs are opaque strings. The conventional prefixes (`INC-`, `PRB-`, `CHG-`,
//! `KB-`) are only used for display and for inferring a kind when the caller
//! does not say; lookups never depend on them.

mod entity;

pub use entity::{Asset, Change, Entity, Incident, KnowledgeArticle, Problem};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The five entity collections the graph links between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Incident,
    Problem,
    Change,
    Asset,
    KnowledgeArticle,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Incident,
        Self::Problem,
        Self::Change,
        Self::Asset,
        Self::KnowledgeArticle,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Problem => "problem",
            Self::Change => "change",
            Self::Asset => "asset",
            Self::KnowledgeArticle => "knowledge article",
        }
    }

    /// Conventional ID prefix. Assets have none.
    #[must_use]
    pub const fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Incident => Some("INC-"),
            Self::Problem => Some("PRB-"),
            Self::Change => Some("CHG-"),
            Self::KnowledgeArticle => Some("KB-"),
            Self::Asset => None,
        }
    }

    /// Best-effort kind inference from an ID prefix (case-insensitive).
    ///
    /// Anything without a known prefix is assumed to be an asset, matching
    /// how asset tags are free-form in the source data.
    #[must_use]
    pub fn infer(id: &str) -> Self {
        let upper = id.trim().to_ascii_uppercase();
        for kind in [
            Self::Incident,
            Self::Problem,
            Self::Change,
            Self::KnowledgeArticle,
        ] {
            if kind.prefix().is_some_and(|p| upper.starts_with(p)) {
                return kind;
            }
        }
        Self::Asset
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl FromStr for EntityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incident" | "inc" => Ok(Self::Incident),
            "problem" | "prb" => Ok(Self::Problem),
            "change" | "chg" => Ok(Self::Change),
            "asset" => Ok(Self::Asset),
            "kb" | "knowledge" | "knowledge_article" | "article" => Ok(Self::KnowledgeArticle),
            _ => Err(ParseEnumError {
                expected: "entity kind",
                got: s.to_string(),
            }),
        }
    }
}

/// Append `id` unless it is already present. Returns `true` if appended.
pub(crate) fn push_unique(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    true
}

/// Remove every occurrence of `id`. Returns `true` if anything was removed.
pub(crate) fn remove_id(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}
