use serde_json::Value;

/// Column set of every per-partition table, in order. The master table adds
/// a leading `country_code` provenance column on top of these.
pub const TABLE_COLUMNS: [&str; 8] = [
    "description",
    "title",
    "id",
    "company",
    "adref",
    "location",
    "created",
    "search_term",
];

/// One flattened job listing. Every field defaults to an empty string when
/// the source field or its nesting is absent; absence never fails a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub description: String,
    pub title: String,
    pub id: String,
    pub company: String,
    pub adref: String,
    pub location: String,
    /// Raw `created` value as received; parsed only when a date filter is
    /// active, never reparsed for storage.
    pub created: String,
    pub search_term: String,
}

impl JobRecord {
    /// Project one raw result object into the fixed row schema.
    ///
    /// `search_term` comes from the partition key, not from record content.
    pub fn from_result(result: &Value, search_term: &str) -> Self {
        Self {
            description: str_field(result, "description"),
            title: str_field(result, "title"),
            id: str_field(result, "id"),
            company: nested_str_field(result, "company", "display_name"),
            adref: str_field(result, "adref"),
            location: nested_str_field(result, "location", "display_name"),
            created: str_field(result, "created"),
            search_term: search_term.to_string(),
        }
    }

    pub fn into_row(self) -> Vec<String> {
        vec![
            self.description,
            self.title,
            self.id,
            self.company,
            self.adref,
            self.location,
            self.created,
            self.search_term,
        ]
    }
}

/// Top-level field accessor with an empty-string default. Strings are taken
/// as-is; numbers are rendered (upstream ids are sometimes numeric); any
/// other shape yields the default.
fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Accessor for a string one level down, e.g. `company.display_name`.
/// An absent outer object, a non-object outer value, or an absent inner
/// field all yield the empty-string default.
fn nested_str_field(value: &Value, outer: &str, inner: &str) -> String {
    match value.get(outer) {
        Some(Value::Object(map)) => match map.get(inner) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}
