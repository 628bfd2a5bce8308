//! Decoders for `key: value` response bodies.
//!
//! [`records`] starts a new record whenever a key repeats. That breaks on record
//! kinds where a field other than the first may legitimately appear twice (song
//! lists carrying several `MUSICBRAINZ_TRACKID` lines, for instance); use
//! [`records_by_key`] or [`songs`] for those.

use crate::error::ParseError;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field name that opens every song record.
pub const SONG_START_KEY: &str = "file";

/// Ordered field/value mapping. Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Sets `key`, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Decodes a body into one record; the last value of a repeated key wins.
pub fn key_values(body: &str) -> Result<Record, ParseError> {
    let mut record = Record::new();
    for entry in entries(body) {
        let (key, value) = entry?;
        record.insert(key, value);
    }
    Ok(record)
}

/// Decodes a record stream, starting a new record whenever a key repeats.
///
/// Always yields at least one (possibly empty) record.
pub fn records(body: &str) -> Result<Vec<Record>, ParseError> {
    let mut results = Vec::new();
    let mut current = Record::new();
    for entry in entries(body) {
        let (key, value) = entry?;
        if current.contains_key(key) {
            results.push(std::mem::take(&mut current));
        }
        current.insert(key, value);
    }
    results.push(current);
    Ok(results)
}

/// Decodes a record stream in which every record opens with `start_key`.
///
/// Keys are compared trimmed and case-insensitively. Other keys may repeat
/// within a record; the last value wins. Lines before the first `start_key`
/// form a record of their own.
pub fn records_by_key(body: &str, start_key: &str) -> Result<Vec<Record>, ParseError> {
    let start_key = start_key.trim();
    let mut results = Vec::new();
    let mut current: Option<Record> = None;
    for entry in entries(body) {
        let (key, value) = entry?;
        if key.trim().eq_ignore_ascii_case(start_key) {
            results.extend(current.take());
        }
        current.get_or_insert_with(Record::new).insert(key, value);
    }
    results.extend(current);
    Ok(results)
}

/// Decodes a song list (`file:` opens each song).
pub fn songs(body: &str) -> Result<Vec<Record>, ParseError> {
    records_by_key(body, SONG_START_KEY)
}

fn entries(body: &str) -> impl Iterator<Item = Result<(&str, &str), ParseError>> {
    body.split('\n').filter(|line| !line.is_empty()).map(|line| {
        split_entry(line).ok_or_else(|| ParseError {
            line: line.to_string(),
        })
    })
}

/// Splits `<key>: <value>`; the key is the run of non-space characters right
/// before the first `": "` it can end at.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (sep, _) = line
        .match_indices(": ")
        .find(|(idx, _)| *idx > 0 && !line[..*idx].ends_with(' '))?;
    let prefix = &line[..sep];
    let key_start = prefix.rfind(' ').map(|idx| idx + 1).unwrap_or(0);
    Some((&prefix[key_start..], &line[sep + 2..]))
}
