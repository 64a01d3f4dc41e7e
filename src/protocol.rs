//! The record format exchanged with the collector.
//!
//! Requests and responses are both flat maps of string keys to string
//! values. On the wire a record is a JSON object whose members are all
//! strings, serialized in key order:
//!
//! ```json
//! {"account":"7c1d-42","cpu.load":"0.5|2|","localIp":"10.0.0.12"}
//! ```

use std::collections::btree_map::{self, BTreeMap};
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Reserved request key carrying the account id.
pub const ACCOUNT: &str = "account";
/// Reserved request key carrying the local network address.
pub const LOCAL_IP: &str = "localIp";
/// Reserved request key carrying the host disambiguator.
pub const LOWEST_PORT: &str = "lowestPort";
/// Reserved request key carrying `"<name> <version>"` of the host server.
pub const APPSERVER: &str = "appserver";
/// Reserved key carrying the session continuation token, both ways.
pub const SESSION: &str = "session";
/// Reserved response key carrying the suspension reason.
pub const ONHOLD: &str = "onhold";

/// An ordered map of string keys to string values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    entries: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Returns the value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the record into the given writer.
    pub fn to_writer<W>(&self, writer: W) -> Result<(), CodecError>
    where
        W: Write,
    {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Serializes the record into a byte vector.
    pub fn to_vec(&self) -> Vec<u8> {
        // a map of strings always serializes
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parses a record from bytes.
    ///
    /// The body must be a single JSON object with string members.
    pub fn from_slice(slice: &[u8]) -> Result<Record, CodecError> {
        Ok(serde_json::from_slice(slice)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_sorted() {
        let record: Record = vec![("session", "S1"), ("account", "a-1"), ("cpu.load", "0.5|2|")]
            .into_iter()
            .collect();
        assert_eq!(
            String::from_utf8(record.to_vec()).unwrap(),
            r#"{"account":"a-1","cpu.load":"0.5|2|","session":"S1"}"#
        );
    }

    #[test]
    fn test_escapes() {
        let mut record = Record::new();
        record.insert("odd=key", "line one\nline two\\ end\t\"");
        let body = record.to_vec();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"odd=key":"line one\nline two\\ end\t\""}"#
        );
        assert_eq!(Record::from_slice(&body).unwrap(), record);
    }

    #[test]
    fn test_to_writer() {
        let record: Record = vec![("session", "S1")].into_iter().collect();
        let mut body = Vec::new();
        record.to_writer(&mut body).unwrap();
        assert_eq!(body, record.to_vec());
    }

    #[test]
    fn test_parse_response() {
        let body = b"{\n  \"session\": \"S1\",\n  \"mem.used\": \"mem:type=Heap|used|true\"\n}\n";
        let record = Record::from_slice(body).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(SESSION), Some("S1"));
        assert_eq!(record.get("mem.used"), Some("mem:type=Heap|used|true"));
    }

    #[test]
    fn test_empty_object() {
        assert!(Record::from_slice(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        for body in [
            &b"this is not json"[..],
            b"[\"session\", \"S1\"]",
            b"{\"session\": 1}",
            b"{\"session\": null}",
            b"{\"session\": \"S1\"",
            &[b'{', b'"', 0xff, b'"', b':', b'"', b'"', b'}'],
        ] {
            assert!(
                matches!(Record::from_slice(body), Err(CodecError::InvalidJson(_))),
                "{:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }
}
