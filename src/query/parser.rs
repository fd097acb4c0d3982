//! ServerQuery response parsing.
//!
//! A response body is zero or more items separated by `|`; each item is
//! a run of `key=value` or bare `key` tokens separated by spaces. Keys
//! and values are unescaped individually. Parsing never fails: tokens
//! that unescape to an empty key are dropped, everything else becomes a
//! field.

use crate::query::escape::unescape;

/// One decoded item from a query response.
///
/// Field order is preserved from the wire, which keeps dumps of raw
/// responses diffable against parsed output. Lookups are linear; items
/// carry a few dozen fields at most. A bare `key` token is stored with
/// an empty value - the protocol does not distinguish flags from
/// empty-valued fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any earlier occurrence of the key.
    pub fn insert(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Field value for label emission: absent fields come back as "".
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse a raw (escaped) response body into records.
///
/// An empty body yields no records, not one empty record: write-only
/// commands answer with nothing but their error terminator.
pub fn parse_response(body: &str) -> Vec<Record> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split('|').map(parse_item).collect()
}

fn parse_item(item: &str) -> Record {
    let mut record = Record::new();
    for token in item.split_whitespace() {
        let (key, value) = match token.split_once('=') {
            Some((k, v)) => (unescape(k), unescape(v)),
            None => (unescape(token), String::new()),
        };
        if key.is_empty() {
            continue;
        }
        record.insert(key, value);
    }
    record
}
