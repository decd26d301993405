use crate::DocumentKey;
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use salvage_extract::models::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Metadata stored for one document, with bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: DocumentKey,
    /// Where the document came from, when known.
    pub source_name: Option<String>,
    pub created_at: OffsetDateTime,
    pub metadata: Metadata,
    /// Free-form details about how the metadata was obtained.
    pub extra_info: Map<String, Value>,
}

impl CacheEntry {
    pub fn new(key: DocumentKey, metadata: Metadata) -> Self {
        Self {
            key,
            source_name: None,
            created_at: OffsetDateTime::now_utc(),
            metadata,
            extra_info: Map::new(),
        }
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_extra_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_info.insert(key.into(), value.into());
        self
    }
}

/// On-disk shape of an entry.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EntryRecord {
    cache_key: DocumentKey,
    source_name: Option<String>,
    created_at: String,
    metadata: Metadata,
    #[serde(default)]
    extra_info: Map<String, Value>,
}

impl TryFrom<&CacheEntry> for EntryRecord {
    type Error = Error;
    fn try_from(entry: &CacheEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            cache_key: entry.key.clone(),
            source_name: entry.source_name.clone(),
            created_at: entry
                .created_at
                .format(&Rfc3339)
                .or_raise(|| ErrorKind::InvalidData("created_at"))?,
            metadata: entry.metadata.clone(),
            extra_info: entry.extra_info.clone(),
        })
    }
}

impl TryFrom<EntryRecord> for CacheEntry {
    type Error = Error;
    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            key: record.cache_key,
            source_name: record.source_name,
            created_at: OffsetDateTime::parse(&record.created_at, &Rfc3339)
                .or_raise(|| ErrorKind::InvalidData("created_at"))?,
            metadata: record.metadata,
            extra_info: record.extra_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_record_wire_format() {
        let entry = CacheEntry {
            created_at: datetime!(2026-03-01 12:30:00 UTC),
            ..CacheEntry::new(DocumentKey::parse("page").unwrap(), Metadata::with_main_css(["article"]))
                .with_source_name("page.html")
                .with_extra_info("analyzer", "static")
        };
        let value = serde_json::to_value(EntryRecord::try_from(&entry).unwrap()).unwrap();
        assert_eq!(value["cache_key"], "page");
        assert_eq!(value["source_name"], "page.html");
        assert_eq!(value["created_at"], "2026-03-01T12:30:00Z");
        assert_eq!(value["metadata"]["content_zones"]["main"]["css"][0], "article");
        assert_eq!(value["extra_info"]["analyzer"], "static");

        let record: EntryRecord = serde_json::from_value(value).unwrap();
        assert_eq!(CacheEntry::try_from(record).unwrap(), entry);
    }

    #[test]
    fn test_bad_timestamp_is_invalid_data() {
        let record: EntryRecord = serde_json::from_value(serde_json::json!({
            "cache_key": "page",
            "source_name": null,
            "created_at": "yesterday",
            "metadata": {},
        }))
        .unwrap();
        let error = CacheEntry::try_from(record).unwrap_err();
        assert!(matches!(&*error, ErrorKind::InvalidData("created_at")));
    }
}
