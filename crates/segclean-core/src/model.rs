//! Segment records as returned by the management API.
//!
//! Only the fields the engine reads are typed. Everything else on the record
//! (and inside `query`) is kept in `extra` so an update body round-trips the
//! full record the server sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Wire tag for host-application segments.
pub const HOST_APP: &str = "HOST_APP";

/// Segment category. Only [`SegmentType::HostApp`] takes part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SegmentType {
    HostApp,
    Other(String),
}

impl SegmentType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::HostApp => HOST_APP,
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for SegmentType {
    fn from(raw: String) -> Self {
        if raw == HOST_APP {
            Self::HostApp
        } else {
            Self::Other(raw)
        }
    }
}

impl From<SegmentType> for String {
    fn from(value: SegmentType) -> Self {
        match value {
            SegmentType::HostApp => HOST_APP.to_string(),
            SegmentType::Other(raw) => raw,
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four list-valued query fields unioned during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListField {
    AppNames,
    Hosts,
    CollectionsForHosts,
    CollectionsForApps,
}

impl ListField {
    /// Every mergeable field, in merge order.
    pub const ALL: [Self; 4] = [
        Self::AppNames,
        Self::Hosts,
        Self::CollectionsForHosts,
        Self::CollectionsForApps,
    ];

    /// Field name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppNames => "appNames",
            Self::Hosts => "hosts",
            Self::CollectionsForHosts => "collectionsForHosts",
            Self::CollectionsForApps => "collectionsForApps",
        }
    }
}

impl fmt::Display for ListField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute bundle of a segment.
///
/// List fields are `Option` because the API omits them on some records; a
/// record missing any of them cannot be merged safely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub segment_type: Option<SegmentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_names: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections_for_hosts: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections_for_apps: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SegmentQuery {
    #[must_use]
    pub const fn list(&self, field: ListField) -> Option<&Vec<Value>> {
        match field {
            ListField::AppNames => self.app_names.as_ref(),
            ListField::Hosts => self.hosts.as_ref(),
            ListField::CollectionsForHosts => self.collections_for_hosts.as_ref(),
            ListField::CollectionsForApps => self.collections_for_apps.as_ref(),
        }
    }

    pub fn list_mut(&mut self, field: ListField) -> Option<&mut Vec<Value>> {
        match field {
            ListField::AppNames => self.app_names.as_mut(),
            ListField::Hosts => self.hosts.as_mut(),
            ListField::CollectionsForHosts => self.collections_for_hosts.as_mut(),
            ListField::CollectionsForApps => self.collections_for_apps.as_mut(),
        }
    }

    fn slot(&mut self, field: ListField) -> &mut Option<Vec<Value>> {
        match field {
            ListField::AppNames => &mut self.app_names,
            ListField::Hosts => &mut self.hosts,
            ListField::CollectionsForHosts => &mut self.collections_for_hosts,
            ListField::CollectionsForApps => &mut self.collections_for_apps,
        }
    }

    /// List fields absent from this query.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<ListField> {
        ListField::ALL
            .into_iter()
            .filter(|field| self.list(*field).is_none())
            .collect()
    }
}

/// One named segment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub query: SegmentQuery,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    /// Build a segment with all four list fields present and empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>, segment_type: SegmentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            query: SegmentQuery {
                segment_type: Some(segment_type),
                app_names: Some(Vec::new()),
                hosts: Some(Vec::new()),
                collections_for_hosts: Some(Vec::new()),
                collections_for_apps: Some(Vec::new()),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Shorthand for a host-application segment.
    pub fn host_app(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, SegmentType::HostApp)
    }

    /// Replace one list field with string entries.
    #[must_use]
    pub fn with_entries<I, S>(mut self, field: ListField, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.query.slot(field) = Some(
            entries
                .into_iter()
                .map(|entry| Value::String(entry.into()))
                .collect(),
        );
        self
    }

    /// Drop one list field, as the API does for incomplete records.
    #[must_use]
    pub fn without(mut self, field: ListField) -> Self {
        *self.query.slot(field) = None;
        self
    }

    #[must_use]
    pub fn is_host_app(&self) -> bool {
        matches!(self.query.segment_type, Some(SegmentType::HostApp))
    }

    #[must_use]
    pub const fn list(&self, field: ListField) -> Option<&Vec<Value>> {
        self.query.list(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_app_tag_round_trips() {
        let ty: SegmentType = serde_json::from_value(json!("HOST_APP")).expect("parse");
        assert_eq!(ty, SegmentType::HostApp);
        assert_eq!(serde_json::to_value(&ty).expect("encode"), json!("HOST_APP"));

        let other: SegmentType = serde_json::from_value(json!("IP_RANGE")).expect("parse");
        assert_eq!(other, SegmentType::Other("IP_RANGE".to_string()));
        assert_eq!(other.to_string(), "IP_RANGE");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "72058",
            "name": "crm",
            "enabled": true,
            "query": {
                "type": "HOST_APP",
                "appNames": ["crm"],
                "hosts": [],
                "collectionsForHosts": [{"id": "c1"}],
                "collectionsForApps": [],
                "matchMode": "ANY"
            }
        });

        let segment: Segment = serde_json::from_value(raw.clone()).expect("parse");
        assert!(segment.is_host_app());
        assert_eq!(segment.extra.get("enabled"), Some(&json!(true)));
        assert_eq!(segment.query.extra.get("matchMode"), Some(&json!("ANY")));
        assert_eq!(serde_json::to_value(&segment).expect("encode"), raw);
    }

    #[test]
    fn absent_lists_are_reported_missing() {
        let raw = json!({
            "id": "1",
            "name": "crm-1",
            "query": {"type": "HOST_APP", "appNames": [], "hosts": null}
        });
        let segment: Segment = serde_json::from_value(raw).expect("parse");
        assert_eq!(
            segment.query.missing_fields(),
            vec![
                ListField::Hosts,
                ListField::CollectionsForHosts,
                ListField::CollectionsForApps
            ]
        );
    }

    #[test]
    fn missing_query_defaults_to_untyped() {
        let segment: Segment =
            serde_json::from_value(json!({"id": "9", "name": "bare"})).expect("parse");
        assert!(!segment.is_host_app());
        assert_eq!(segment.query.missing_fields().len(), 4);
    }

    #[test]
    fn builder_sets_string_entries() {
        let segment = Segment::host_app("1", "a").with_entries(ListField::Hosts, ["h1", "h2"]);
        assert_eq!(
            segment.list(ListField::Hosts),
            Some(&vec![json!("h1"), json!("h2")])
        );
        assert!(segment.without(ListField::Hosts).list(ListField::Hosts).is_none());
    }
}
