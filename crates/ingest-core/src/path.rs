//! Parses object keys into destinations and table prefixes.

use regex::Regex;

use crate::error::IngestError;
use crate::types::Destination;

/// Default destination pattern: `<dataset>/<table>[/$partition][/yyyy/mm/dd/hh][/batch]/...`
pub const DEFAULT_DESTINATION_REGEX: &str = concat!(
    r"^(?P<dataset>[\w\-\.]+)/(?P<table>[\w\-\.]+)/?",
    r"(?P<partition>\$[0-9]+)?/?",
    r"((?P<yyyy>\d{4})/?(?P<mm>\d{2})?/?(?P<dd>\d{2})?/?(?P<hh>\d{2})?/?)?",
    r"(?P<batch>[\w\-]+)?/",
);

/// Compiles and applies a destination pattern against object keys.
///
/// Construction is fallible because the pattern is operator-configured; hold
/// one `PathParser` per invocation rather than recompiling per object.
pub struct PathParser {
    pattern: Regex,
}

impl PathParser {
    pub fn new(pattern: &str) -> Result<Self, IngestError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| IngestError::Other(anyhow::anyhow!("invalid destination regex: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn default_pattern() -> Self {
        Self::new(DEFAULT_DESTINATION_REGEX).expect("default destination regex is valid")
    }

    /// Parses `object_id` into a `Destination`, deriving the partition from
    /// either an explicit `$N` capture or the concatenated date segments.
    pub fn parse(&self, object_id: &str) -> Result<Destination, IngestError> {
        let caps = self
            .pattern
            .captures(object_id)
            .ok_or_else(|| IngestError::BadDestination {
                object: object_id.to_string(),
            })?;

        let dataset = caps
            .name("dataset")
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| IngestError::BadDestination {
                object: object_id.to_string(),
            })?;
        let table = caps
            .name("table")
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| IngestError::BadDestination {
                object: object_id.to_string(),
            })?;

        let partition = if let Some(m) = caps.name("partition") {
            Some(m.as_str().trim_start_matches('$').to_string())
        } else {
            let mut date = String::new();
            for group in ["yyyy", "mm", "dd", "hh"] {
                match caps.name(group) {
                    Some(m) => date.push_str(m.as_str()),
                    None => break,
                }
            }
            if date.is_empty() {
                None
            } else {
                Some(date)
            }
        };

        let batch = caps.name("batch").map(|m| m.as_str().to_string());

        Ok(Destination {
            dataset,
            table,
            partition,
            batch,
        })
    }

    /// The slice of `object_id` ending at the close of the `table` capture —
    /// the root under which all control state for that table lives.
    pub fn table_prefix<'a>(&self, object_id: &'a str) -> Result<&'a str, IngestError> {
        let caps = self
            .pattern
            .captures(object_id)
            .ok_or_else(|| IngestError::BadDestination {
                object: object_id.to_string(),
            })?;
        let table = caps.name("table").ok_or_else(|| IngestError::BadDestination {
            object: object_id.to_string(),
        })?;
        Ok(&object_id[..table.end()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PathParser {
        PathParser::default_pattern()
    }

    #[test]
    fn parses_simple_table() {
        let dest = parser().parse("ds1/t1/part-00000").unwrap();
        assert_eq!(dest.dataset, "ds1");
        assert_eq!(dest.table, "t1");
        assert_eq!(dest.partition, None);
    }

    #[test]
    fn parses_explicit_partition() {
        let dest = parser().parse("ds1/t1/$20230101/part-00000").unwrap();
        assert_eq!(dest.partition, Some("20230101".to_string()));
    }

    #[test]
    fn parses_date_segments_right_truncated() {
        let dest = parser().parse("ds1/t1/2023/01/part-00000").unwrap();
        assert_eq!(dest.partition, Some("202301".to_string()));
    }

    #[test]
    fn bad_destination_on_no_match() {
        let err = parser().parse("not-a-valid-path").unwrap_err();
        assert!(matches!(err, IngestError::BadDestination { .. }));
    }

    #[test]
    fn table_prefix_is_prefix_of_object_id() {
        let object_id = "ds1/t1/batch01/_SUCCESS";
        let prefix = parser().table_prefix(object_id).unwrap();
        assert!(object_id.starts_with(prefix));
        assert_eq!(prefix, "ds1/t1");
    }

    #[test]
    fn table_prefix_and_parse_agree_on_table() {
        let p = parser();
        let object_id = "ds1/t1/batch01/part-00000";
        let prefix = p.table_prefix(object_id).unwrap();
        let direct = p.parse(object_id).unwrap();
        let via_prefix = p.parse(&format!("{prefix}/x")).unwrap();
        assert_eq!(direct.table, via_prefix.table);
    }
}
