//! Origin-specific overrides, applied before dispatch.
//! Ported from `kl3m_data/parsers/generic_object.py::patch_source_metadata`.

/// An override to the declared `source` and/or `format` for an envelope,
/// keyed by a dataset-path prefix.
pub struct OriginOverride {
    pub path_prefix: &'static str,
    pub source: Option<&'static str>,
    pub force_format: Option<&'static str>,
}

pub const ORIGIN_OVERRIDES: &[OriginOverride] = &[
    OriginOverride {
        path_prefix: "documents/dockets/",
        source: Some("https://archive.org/download/federal-court-dockets"),
        force_format: None,
    },
    OriginOverride {
        path_prefix: "documents/fdlp/",
        source: Some("https://permanent.fdlp.gov/"),
        force_format: None,
    },
    OriginOverride {
        path_prefix: "documents/eu_oj/",
        source: Some("https://publications.europa.eu/"),
        force_format: None,
    },
    OriginOverride {
        path_prefix: "documents/uspto/",
        source: None,
        force_format: Some("text/markdown"),
    },
];

/// Source value that selects the EU-OJ specialized XML extractor over the
/// generic XML extractor in dispatch.
pub const EU_OJ_SOURCE: &str = "https://publications.europa.eu/";

/// Apply the origin overrides table to a candidate `(source, format)` pair
/// for an object stored at `object_key`. `source` is only overridden when
/// absent; `format` for `documents/uspto/*` is overridden unconditionally,
/// matching the original's behavior exactly.
pub fn patch_source_metadata(
    object_key: &str,
    mut source: Option<String>,
    mut format: String,
) -> (Option<String>, String) {
    for rule in ORIGIN_OVERRIDES {
        if !object_key.starts_with(rule.path_prefix) {
            continue;
        }
        if source.is_none() {
            if let Some(s) = rule.source {
                source = Some(s.to_string());
            }
        }
        if let Some(f) = rule.force_format {
            format = f.to_string();
        }
    }
    (source, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dockets_get_default_source_only_when_absent() {
        let (source, _) = patch_source_metadata("documents/dockets/1/a.json", None, "text/plain".into());
        assert_eq!(source.as_deref(), Some("https://archive.org/download/federal-court-dockets"));

        let (source, _) = patch_source_metadata(
            "documents/dockets/1/a.json",
            Some("https://example.com".into()),
            "text/plain".into(),
        );
        assert_eq!(source.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn uspto_forces_markdown_unconditionally() {
        let (_, format) = patch_source_metadata("documents/uspto/1/a.json", None, "text/plain".into());
        assert_eq!(format, "text/markdown");
    }

    #[test]
    fn unmatched_prefix_is_unchanged() {
        let (source, format) = patch_source_metadata("documents/other/1/a.json", None, "text/plain".into());
        assert_eq!(source, None);
        assert_eq!(format, "text/plain");
    }
}
