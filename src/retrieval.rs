//! Scoped retrieval over the vector index.
//!
//! This is the soft-fail boundary of the read path: whatever goes wrong
//! underneath, callers get a (possibly empty) list of ranked context
//! records, never an error. An empty list means "no relevant documentation"
//! and is rendered as such downstream.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::index::VectorIndex;
use crate::models::{ContextRecord, SourceKind};

/// Retrieval-time restriction on chunk origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Web,
    Pdf,
}

impl Scope {
    /// The metadata filter this scope translates to.
    pub fn as_filter(&self) -> Option<SourceKind> {
        match self {
            Scope::All => None,
            Scope::Web => Some(SourceKind::Web),
            Scope::Pdf => Some(SourceKind::Pdf),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Web => "web",
            Scope::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown scope: '{0}'. Use all, web, or pdf.")]
pub struct ScopeParseError(String);

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "web" => Ok(Scope::Web),
            "pdf" => Ok(Scope::Pdf),
            other => Err(ScopeParseError(other.to_string())),
        }
    }
}

/// Issues scoped similarity queries and shapes results into ranked context
/// records.
pub struct RetrievalEngine {
    index: Arc<VectorIndex>,
}

impl RetrievalEngine {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    /// Up to `k` context records for `query`, most similar first.
    ///
    /// Index failures are logged and converted into an empty list; this
    /// method never propagates an error to the answer path.
    pub async fn retrieve(&self, query: &str, k: usize, scope: Scope) -> Vec<ContextRecord> {
        match self.index.query(query, k, scope.as_filter()).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, scope = scope.as_str(), "retrieval failed, returning no context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parses_from_query_strings() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!("web".parse::<Scope>().unwrap(), Scope::Web);
        assert_eq!("pdf".parse::<Scope>().unwrap(), Scope::Pdf);
        assert!("books".parse::<Scope>().is_err());
    }

    #[test]
    fn scope_maps_to_metadata_filter() {
        assert_eq!(Scope::All.as_filter(), None);
        assert_eq!(Scope::Web.as_filter(), Some(SourceKind::Web));
        assert_eq!(Scope::Pdf.as_filter(), Some(SourceKind::Pdf));
    }
}
