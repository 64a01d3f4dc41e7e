//! Turns the subscribed items into an outgoing record.

use std::panic::{self, AssertUnwindSafe};

use crate::error::QueryError;
use crate::management::{ManagementFacade, ObjectName, TypeTag, Value};
use crate::protocol::Record;
use crate::registry::ItemRegistry;
use crate::utils::panic_message;

/// Samples every subscribed item once.
///
/// Each item's name pattern is expanded and every instance is read. The
/// first instance is reported under the item id, later ones under
/// `<id>:<index>`. Instance order follows the stores and is only stable
/// within one call.
///
/// Items are evicted as they are consumed: a failed query evicts the item
/// whatever its retention policy, and non-periodic items are evicted after
/// their single attempt. A store that panics counts as a failed query.
pub fn sample(registry: &mut ItemRegistry, facade: &ManagementFacade) -> Record {
    let mut record = Record::new();
    let mut evicted = Vec::new();

    for item in registry.iter() {
        let pattern = match item.name_pattern().parse::<ObjectName>() {
            Ok(pattern) => pattern,
            Err(err) => {
                log::debug!("not resolving '{}': {}", item.name_pattern(), err);
                if !item.is_periodic() {
                    evicted.push(item.id().to_owned());
                }
                continue;
            }
        };

        let names = match guarded(|| Ok(facade.query_names(&pattern))) {
            Ok(names) => names,
            Err(err) => {
                log::warn!("unable to resolve {}: {}", item.id(), err);
                record.insert(item.id(), encode_failure(&err));
                evicted.push(item.id().to_owned());
                continue;
            }
        };

        let mut failed = false;
        for (idx, name) in names.iter().enumerate() {
            let key = instance_key(item.id(), idx);
            let value = match guarded(|| facade.query_value(name, item.attribute_path())) {
                Ok(value) => encode_value(value.as_ref(), name, &pattern),
                Err(err) => {
                    log::debug!("unable to sample {}: {}", item.id(), err);
                    failed = true;
                    encode_failure(&err)
                }
            };
            record.insert(key, value);
        }

        if failed || !item.is_periodic() {
            evicted.push(item.id().to_owned());
        }
    }

    if !evicted.is_empty() {
        registry.retain(|item| !evicted.iter().any(|id| id == item.id()));
    }
    record
}

/// Runs a store call, turning a panic into a store failure.
fn guarded<T, F>(f: F) -> Result<T, QueryError>
where
    F: FnOnce() -> Result<T, QueryError>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(QueryError::Store(panic_message(&*payload))))
}

fn instance_key(id: &str, idx: usize) -> String {
    if idx == 0 {
        id.to_owned()
    } else {
        format!("{}:{}", id, idx)
    }
}

/// Encodes a sample as `<raw>|<tag>|<resolved name>`.
///
/// The resolved name is only sent when it differs from what the collector
/// asked for, that is when `pattern` had to be expanded.
pub fn encode_value(value: Option<&Value>, name: &ObjectName, pattern: &ObjectName) -> String {
    let resolved = if pattern.is_pattern() && name != pattern {
        name.to_string()
    } else {
        String::new()
    };
    match value {
        Some(value) => format!("{}|{}|{}", value, value.type_tag(), resolved),
        None => format!("|{}|{}", TypeTag::Missing, resolved),
    }
}

/// Encodes a failed query with an empty raw value and tag.
pub fn encode_failure(err: &QueryError) -> String {
    format!("||{}", err)
}
