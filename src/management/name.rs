use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use regex::Regex;

use crate::error::QueryError;

/// The name of a management bean: `domain:key=value[,key=value]*`.
///
/// A name may also be a pattern. Patterns use `*` and `?` in the domain
/// and in property values, and a trailing `*` entry in the property list
/// to accept names carrying additional properties.
///
/// ```
/// use monitor_probe::management::ObjectName;
///
/// let pattern: ObjectName = "*:type=ThreadPool,*".parse().unwrap();
/// let name: ObjectName = "Catalina:type=ThreadPool,name=http-8080".parse().unwrap();
/// assert!(pattern.is_pattern());
/// assert!(pattern.matches(&name));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectName {
    domain: Glob,
    properties: BTreeMap<String, Glob>,
    property_wildcard: bool,
}

impl ObjectName {
    /// Returns the domain part.
    pub fn domain(&self) -> &str {
        &self.domain.text
    }

    /// Returns the value of a key property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|value| value.text.as_str())
    }

    /// Iterates the key properties in canonical (sorted) order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.text.as_str()))
    }

    /// Returns `true` if this name selects other names instead of naming one.
    pub fn is_pattern(&self) -> bool {
        self.property_wildcard
            || self.domain.is_pattern()
            || self.properties.values().any(Glob::is_pattern)
    }

    /// Checks whether `name` is selected by this name.
    ///
    /// A concrete name only matches itself.
    pub fn matches(&self, name: &ObjectName) -> bool {
        if !self.domain.matches(&name.domain.text) {
            return false;
        }
        for (key, pattern) in &self.properties {
            match name.properties.get(key) {
                Some(value) if pattern.matches(&value.text) => {}
                _ => return false,
            }
        }
        self.property_wildcard || self.properties.len() == name.properties.len()
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// A domain or property value, compiled to an anchored regex when it
/// carries wildcards. Compares, orders and hashes by its text.
#[derive(Clone, Debug)]
struct Glob {
    text: String,
    regex: Option<Regex>,
}

impl Glob {
    fn new(text: &str) -> Glob {
        let regex = if has_wildcard(text) {
            let pattern = regex::escape(text)
                .replace(r"\*", ".*")
                .replace(r"\?", ".");
            Regex::new(&format!("^(?s:{})$", pattern)).ok()
        } else {
            None
        };
        Glob {
            text: text.to_owned(),
            regex,
        }
    }

    fn is_pattern(&self) -> bool {
        self.regex.is_some()
    }

    fn matches(&self, text: &str) -> bool {
        match self.regex {
            Some(ref regex) => regex.is_match(text),
            None => self.text == text,
        }
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Glob) -> bool {
        self.text == other.text
    }
}

impl Eq for Glob {}

impl PartialOrd for Glob {
    fn partial_cmp(&self, other: &Glob) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Glob {
    fn cmp(&self, other: &Glob) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl Hash for Glob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl FromStr for ObjectName {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<ObjectName, QueryError> {
        let malformed = || QueryError::MalformedName(s.to_owned());
        let (domain, list) = s.split_once(':').ok_or_else(malformed)?;

        let mut properties = BTreeMap::new();
        let mut property_wildcard = false;
        for entry in list.split(',') {
            let entry = entry.trim();
            if entry == "*" {
                property_wildcard = true;
                continue;
            }
            let (key, value) = entry.split_once('=').ok_or_else(malformed)?;
            let key = key.trim();
            if key.is_empty() || has_wildcard(key) {
                return Err(malformed());
            }
            if properties
                .insert(key.to_owned(), Glob::new(value.trim()))
                .is_some()
            {
                return Err(malformed());
            }
        }
        if properties.is_empty() && !property_wildcard {
            return Err(malformed());
        }

        Ok(ObjectName {
            domain: Glob::new(domain.trim()),
            properties,
            property_wildcard,
        })
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain.text)?;
        let mut first = true;
        for (key, value) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value.text)?;
            first = false;
        }
        if self.property_wildcard {
            if !first {
                f.write_str(",")?;
            }
            f.write_str("*")?;
        }
        Ok(())
    }
}
