use crate::error::KlError;
use std::fmt;

/// The three canonical write-path namespaces, plus the derived `index`
/// namespace. `Raw` is an implementation-defined namespace for unparsed
/// binaries that predate stage 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Documents,
    Representations,
    Parquet,
    Index,
}

impl Stage {
    /// The top-level prefix for this namespace, e.g. `"documents"`.
    pub fn prefix(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Documents => "documents",
            Stage::Representations => "representations",
            Stage::Parquet => "parquet",
            Stage::Index => "index",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "raw" => Some(Stage::Raw),
            "documents" => Some(Stage::Documents),
            "representations" => Some(Stage::Representations),
            "parquet" => Some(Stage::Parquet),
            "index" => Some(Stage::Index),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A fully-qualified object key within one of the stage namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageKey {
    pub stage: Stage,
    pub dataset_id: String,
    /// Arbitrary, possibly-nested document path within the dataset,
    /// e.g. `"a/b/c.json"`. Never includes the stage prefix or dataset id.
    pub document_path: String,
}

impl StageKey {
    pub fn new(stage: Stage, dataset_id: impl Into<String>, document_path: impl Into<String>) -> Self {
        Self {
            stage,
            dataset_id: dataset_id.into(),
            document_path: document_path.into(),
        }
    }

    /// Render as a full object-store key, e.g. `documents/demo/a/b/c.json`.
    pub fn to_key(&self) -> String {
        format!("{}/{}/{}", self.stage.prefix(), self.dataset_id, self.document_path)
    }

    /// Parse a full object-store key back into its components. Fails with
    /// `MalformedKey` if the key does not have at least three `/`-separated
    /// segments under a recognized stage prefix.
    pub fn parse(key: &str) -> Result<Self, KlError> {
        let mut parts = key.splitn(3, '/');
        let stage_str = parts
            .next()
            .ok_or_else(|| KlError::MalformedKey(key.to_string()))?;
        let dataset_id = parts
            .next()
            .ok_or_else(|| KlError::MalformedKey(key.to_string()))?;
        let document_path = parts
            .next()
            .ok_or_else(|| KlError::MalformedKey(key.to_string()))?;
        let stage = Stage::parse(stage_str).ok_or_else(|| KlError::MalformedKey(key.to_string()))?;
        if dataset_id.is_empty() || document_path.is_empty() {
            return Err(KlError::MalformedKey(key.to_string()));
        }
        Ok(StageKey::new(stage, dataset_id, document_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        let key = StageKey::new(Stage::Documents, "demo", "a/b/c.json");
        let rendered = key.to_key();
        assert_eq!(rendered, "documents/demo/a/b/c.json");
        assert_eq!(StageKey::parse(&rendered).unwrap(), key);
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(StageKey::parse("bogus/demo/a.json").is_err());
    }

    #[test]
    fn rejects_too_few_segments() {
        assert!(StageKey::parse("documents/demo").is_err());
    }
}
