//! Access to the management attributes of the host process.
//!
//! A host exposes its runtime introspection data through one or more
//! [`ManagementStore`]s. The [`ManagementFacade`] puts them behind a single
//! query surface, expands name patterns across all of them and remembers
//! which store owns which bean.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::QueryError;

mod memory;
mod name;
#[cfg(unix)]
mod process;
mod value;

pub use memory::{Bean, InMemoryStore};
pub use name::ObjectName;
#[cfg(unix)]
pub use process::ProcessStore;
pub use value::{TypeTag, Value};

/// A runtime introspection store.
///
/// Implement this to bind the probe to whatever registry of management
/// beans the host runtime keeps.
pub trait ManagementStore: Send + Sync + 'static {
    /// Name of this store for debugging and logging.
    fn name(&self) -> &str;

    /// Returns `true` if the concrete bean is registered here.
    fn contains(&self, name: &ObjectName) -> bool;

    /// Returns every registered bean selected by `pattern`.
    fn query_names(&self, pattern: &ObjectName) -> Vec<ObjectName>;

    /// Reads one top-level attribute of a bean.
    ///
    /// `Ok(None)` means the attribute exists but currently has no value.
    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Option<Value>, QueryError>;
}

/// The single query surface over all stores of a process.
///
/// The facade is created together with a probe and dropped with it. The
/// owner cache assumes the set of stores and the store each bean lives in
/// do not change while the facade is alive.
pub struct ManagementFacade {
    stores: Vec<Arc<dyn ManagementStore>>,
    owners: Mutex<HashMap<ObjectName, usize>>,
}

impl Default for ManagementFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementFacade {
    /// Creates a facade without any stores.
    pub fn new() -> Self {
        Self {
            stores: Vec::new(),
            owners: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a store. Earlier stores win when a bean exists in several.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ManagementStore>) -> Self {
        self.stores.push(store);
        self
    }

    /// Returns the number of stores.
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    fn owner(&self, name: &ObjectName) -> Option<&Arc<dyn ManagementStore>> {
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&idx) = owners.get(name) {
            return self.stores.get(idx);
        }
        let idx = self.stores.iter().position(|store| store.contains(name))?;
        owners.insert(name.clone(), idx);
        self.stores.get(idx)
    }

    /// Checks whether a bean (or, for patterns, any matching bean) exists.
    pub fn exists(&self, name: &str) -> bool {
        match name.parse::<ObjectName>() {
            Ok(name) if name.is_pattern() => !self.query_names(&name).is_empty(),
            Ok(name) => self.owner(&name).is_some(),
            Err(_) => false,
        }
    }

    /// Expands a name pattern into the concrete names it selects.
    ///
    /// Unparsable or unmatched patterns yield an empty list.
    pub fn resolve_names(&self, pattern: &str) -> Vec<ObjectName> {
        match pattern.parse::<ObjectName>() {
            Ok(pattern) => self.query_names(&pattern),
            Err(err) => {
                log::debug!("not resolving '{}': {}", pattern, err);
                Vec::new()
            }
        }
    }

    /// Expands an already parsed pattern.
    pub fn query_names(&self, pattern: &ObjectName) -> Vec<ObjectName> {
        if !pattern.is_pattern() {
            return match self.owner(pattern) {
                Some(_) => vec![pattern.clone()],
                None => Vec::new(),
            };
        }

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let mut names = Vec::new();
        for (idx, store) in self.stores.iter().enumerate() {
            for name in store.query_names(pattern) {
                if names.contains(&name) {
                    continue;
                }
                owners.entry(name.clone()).or_insert(idx);
                names.push(name);
            }
        }
        names
    }

    /// Reads a possibly dotted attribute path of a concrete bean.
    ///
    /// `HeapMemoryUsage.used` reads `HeapMemoryUsage` and returns its `used`
    /// field.
    pub fn query_value(
        &self,
        name: &ObjectName,
        attribute_path: &str,
    ) -> Result<Option<Value>, QueryError> {
        let store = self
            .owner(name)
            .ok_or_else(|| QueryError::NoSuchBean(name.to_string()))?;

        let mut segments = attribute_path.split('.');
        let head = segments.next().unwrap_or_default();
        let mut current = store.attribute(name, head)?;
        let mut path = head.to_owned();

        for field in segments {
            let composite = match current {
                Some(value @ Value::Composite(_)) => value,
                _ => {
                    return Err(QueryError::NotComposite {
                        bean: name.to_string(),
                        path,
                    })
                }
            };
            current = match composite.field(field) {
                Some(value) => value.cloned(),
                None => {
                    return Err(QueryError::NoSuchAttribute {
                        bean: name.to_string(),
                        attribute: format!("{}.{}", path, field),
                    })
                }
            };
            path.push('.');
            path.push_str(field);
        }

        Ok(current)
    }

    /// Parses `name` and reads an attribute from it.
    pub fn query(&self, name: &str, attribute_path: &str) -> Result<Option<Value>, QueryError> {
        self.query_value(&name.parse()?, attribute_path)
    }

    /// Reads an attribute and renders it as text.
    pub fn query_string(
        &self,
        name: &str,
        attribute_path: &str,
    ) -> Result<Option<String>, QueryError> {
        Ok(self.query(name, attribute_path)?.map(|v| v.to_string()))
    }
}

impl fmt::Debug for ManagementFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementFacade")
            .field(
                "stores",
                &self.stores.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts ownership probes so the cache can be observed.
    struct CountingStore {
        inner: InMemoryStore,
        lookups: AtomicUsize,
    }

    impl ManagementStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        fn contains(&self, name: &ObjectName) -> bool {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.contains(name)
        }

        fn query_names(&self, pattern: &ObjectName) -> Vec<ObjectName> {
            self.inner.query_names(pattern)
        }

        fn attribute(
            &self,
            name: &ObjectName,
            attribute: &str,
        ) -> Result<Option<Value>, QueryError> {
            self.inner.attribute(name, attribute)
        }
    }

    fn heap_usage() -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("used".to_owned(), Some(Value::from(1024_u64)));
        fields.insert("max".to_owned(), None);
        Value::Composite(fields)
    }

    fn facade() -> ManagementFacade {
        let platform = InMemoryStore::new("platform");
        platform
            .register(
                "java.lang:type=Memory",
                Bean::new().with_value("HeapMemoryUsage", heap_usage()),
            )
            .unwrap();
        platform
            .register("cpu:type=Load,core=0", Bean::new().with_value("Load", 0.5))
            .unwrap();
        let container = InMemoryStore::new("container");
        container
            .register("cpu:type=Load,core=1", Bean::new().with_value("Load", 0.25))
            .unwrap();
        container
            .register(
                "java.lang:type=Memory",
                Bean::new().with_value("HeapMemoryUsage", "shadowed"),
            )
            .unwrap();
        ManagementFacade::new()
            .with_store(Arc::new(platform))
            .with_store(Arc::new(container))
    }

    #[test]
    fn test_dotted_attribute_path() {
        let facade = facade();
        assert_eq!(
            facade.query("java.lang:type=Memory", "HeapMemoryUsage.used").unwrap(),
            Some(Value::UInt(1024))
        );
        assert_eq!(
            facade.query("java.lang:type=Memory", "HeapMemoryUsage.max").unwrap(),
            None
        );
        assert!(matches!(
            facade.query("java.lang:type=Memory", "HeapMemoryUsage.committed"),
            Err(QueryError::NoSuchAttribute { .. })
        ));
        assert!(matches!(
            facade.query("java.lang:type=Memory", "HeapMemoryUsage.used.deeper"),
            Err(QueryError::NotComposite { .. })
        ));
    }

    #[test]
    fn test_missing_bean() {
        let facade = facade();
        assert!(matches!(
            facade.query("java.lang:type=Nope", "Anything"),
            Err(QueryError::NoSuchBean(_))
        ));
        assert!(!facade.exists("java.lang:type=Nope"));
        assert!(facade.exists("java.lang:type=Memory"));
    }

    #[test]
    fn test_resolve_across_stores() {
        let facade = facade();
        let names = facade.resolve_names("cpu:type=Load,*");
        assert_eq!(names.len(), 2);
        assert!(facade.exists("cpu:type=Load,*"));
        assert!(facade.resolve_names("disk:type=Io,*").is_empty());
        assert!(facade.resolve_names("not a name").is_empty());
    }

    #[test]
    fn test_first_store_wins() {
        let facade = facade();
        assert_eq!(
            facade
                .query_string("java.lang:type=Memory", "HeapMemoryUsage.used")
                .unwrap()
                .as_deref(),
            Some("1024")
        );
    }

    #[test]
    fn test_owner_is_cached() {
        let inner = InMemoryStore::new("inner");
        inner
            .register("app:type=Cache", Bean::new().with_value("Hits", 3_u32))
            .unwrap();
        let store = Arc::new(CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        });
        let facade = ManagementFacade::new().with_store(store.clone());

        for _ in 0..3 {
            facade.query("app:type=Cache", "Hits").unwrap();
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }
}
