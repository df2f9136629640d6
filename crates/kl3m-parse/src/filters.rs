//! Ordered line-filter transducers applied to every representation during
//! postprocessing. Pure functions over a string buffer.

/// A pure, ordered line filter. Implementations must not allocate a new
/// buffer unless lines are actually dropped or rewritten.
pub trait LineFilter: Send + Sync {
    fn name(&self) -> &str;
    fn filter(&self, buffer: &str) -> String;
}

/// Strips lines beginning with `VerDate`, a U.S. Government Publishing
/// Office PDF page-header artifact (e.g.
/// `VerDate Mar<15>2010 16:40 Jun 14, 2010 ...`). Ported from
/// `kl3m_data/parsers/filters/verdate.py`.
pub struct VerDateFilter;

impl LineFilter for VerDateFilter {
    fn name(&self) -> &str {
        "verdate"
    }

    fn filter(&self, buffer: &str) -> String {
        buffer
            .split('\n')
            .filter(|line| !line.starts_with("VerDate"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The default ordered filter chain applied to every representation.
pub fn default_filters() -> Vec<Box<dyn LineFilter>> {
    vec![Box::new(VerDateFilter)]
}

/// Apply every filter in order to `content`.
pub fn apply_filters(content: &str, filters: &[Box<dyn LineFilter>]) -> String {
    let mut buffer = content.to_string();
    for filter in filters {
        buffer = filter.filter(&buffer);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdate_drops_matching_lines_only() {
        let input = "page 1\nVerDate Mar<15>2010 16:40 Jun 14, 2010\npage 2";
        let filtered = VerDateFilter.filter(input);
        assert_eq!(filtered, "page 1\npage 2");
    }

    #[test]
    fn default_chain_is_idempotent_on_clean_text() {
        let input = "no headers here\njust text";
        let filtered = apply_filters(input, &default_filters());
        assert_eq!(filtered, input);
    }
}
