use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::{ManagementStore, ObjectName, Value};
use crate::error::QueryError;

type Getter = Arc<dyn Fn() -> Result<Option<Value>, String> + Send + Sync>;

#[derive(Clone)]
enum Attribute {
    Fixed(Option<Value>),
    Live(Getter),
}

impl Attribute {
    fn read(&self) -> Result<Option<Value>, QueryError> {
        match self {
            Attribute::Fixed(value) => Ok(value.clone()),
            Attribute::Live(getter) => getter().map_err(QueryError::Store),
        }
    }
}

/// A set of named attributes registered under one [`ObjectName`].
#[derive(Clone, Default)]
pub struct Bean {
    attributes: BTreeMap<String, Attribute>,
}

impl Bean {
    /// Creates a bean without attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with a fixed value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Fixed(Some(value.into())));
        self
    }

    /// Adds an attribute that exists but holds no value.
    #[must_use]
    pub fn with_null(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), Attribute::Fixed(None));
        self
    }

    /// Adds an attribute whose value is computed on every read.
    ///
    /// An `Err` from the getter surfaces as [`QueryError::Store`].
    #[must_use]
    pub fn with_getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.attributes
            .insert(name.into(), Attribute::Live(Arc::new(getter)));
        self
    }

    /// Returns the attribute names.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A [`ManagementStore`] whose beans are registered at runtime.
///
/// ```
/// use monitor_probe::management::{Bean, InMemoryStore, ManagementStore};
///
/// let store = InMemoryStore::new("app");
/// store
///     .register("app:type=Cache", Bean::new().with_value("Hits", 12_u32))
///     .unwrap();
/// let name = "app:type=Cache".parse().unwrap();
/// assert_eq!(store.attribute(&name, "Hits").unwrap().unwrap().to_string(), "12");
/// ```
pub struct InMemoryStore {
    name: String,
    beans: RwLock<BTreeMap<ObjectName, Bean>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            beans: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a bean, replacing and returning any previous one.
    ///
    /// Patterns cannot be registered.
    pub fn register(&self, name: &str, bean: Bean) -> Result<Option<Bean>, QueryError> {
        let name: ObjectName = name.parse()?;
        if name.is_pattern() {
            return Err(QueryError::MalformedName(name.to_string()));
        }
        let mut beans = self.beans.write().unwrap_or_else(|e| e.into_inner());
        Ok(beans.insert(name, bean))
    }

    /// Removes a bean.
    pub fn unregister(&self, name: &str) -> Option<Bean> {
        let name: ObjectName = name.parse().ok()?;
        let mut beans = self.beans.write().unwrap_or_else(|e| e.into_inner());
        beans.remove(&name)
    }

    /// Replaces the fixed value of one attribute of a registered bean.
    pub fn set_value(
        &self,
        name: &str,
        attribute: &str,
        value: Option<Value>,
    ) -> Result<(), QueryError> {
        let name: ObjectName = name.parse()?;
        let mut beans = self.beans.write().unwrap_or_else(|e| e.into_inner());
        let bean = beans
            .get_mut(&name)
            .ok_or_else(|| QueryError::NoSuchBean(name.to_string()))?;
        bean.attributes
            .insert(attribute.to_owned(), Attribute::Fixed(value));
        Ok(())
    }

    /// Returns the number of registered beans.
    pub fn len(&self) -> usize {
        self.beans.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ManagementStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn contains(&self, name: &ObjectName) -> bool {
        self.beans
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    fn query_names(&self, pattern: &ObjectName) -> Vec<ObjectName> {
        self.beans
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect()
    }

    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Option<Value>, QueryError> {
        // clone out so live getters run without the lock held
        let attr = {
            let beans = self.beans.read().unwrap_or_else(|e| e.into_inner());
            let bean = beans
                .get(name)
                .ok_or_else(|| QueryError::NoSuchBean(name.to_string()))?;
            bean.attributes
                .get(attribute)
                .cloned()
                .ok_or_else(|| QueryError::NoSuchAttribute {
                    bean: name.to_string(),
                    attribute: attribute.to_owned(),
                })?
        };
        attr.read()
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("name", &self.name)
            .field("beans", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    #[test]
    fn test_register_and_read() {
        let store = InMemoryStore::new("test");
        store
            .register(
                "app:type=Pool",
                Bean::new().with_value("Size", 8_i32).with_null("Owner"),
            )
            .unwrap();
        let name: ObjectName = "app:type=Pool".parse().unwrap();

        assert_eq!(store.attribute(&name, "Size").unwrap(), Some(Value::Int(8)));
        assert_eq!(store.attribute(&name, "Owner").unwrap(), None);
        assert!(matches!(
            store.attribute(&name, "Missing"),
            Err(QueryError::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn test_live_getter() {
        let counter = Arc::new(AtomicI64::new(0));
        let store = InMemoryStore::new("test");
        let c = counter.clone();
        store
            .register(
                "app:type=Counter",
                Bean::new()
                    .with_getter("Count", move || {
                        Ok(Some(Value::from(c.fetch_add(1, Ordering::SeqCst))))
                    })
                    .with_getter("Broken", || Err("backend down".into())),
            )
            .unwrap();
        let name: ObjectName = "app:type=Counter".parse().unwrap();

        assert_eq!(store.attribute(&name, "Count").unwrap(), Some(Value::Int(0)));
        assert_eq!(store.attribute(&name, "Count").unwrap(), Some(Value::Int(1)));
        assert!(matches!(
            store.attribute(&name, "Broken"),
            Err(QueryError::Store(msg)) if msg == "backend down"
        ));
    }

    #[test]
    fn test_register_rejects_patterns() {
        let store = InMemoryStore::new("test");
        assert!(store.register("app:type=Pool,*", Bean::new()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_value_and_unregister() {
        let store = InMemoryStore::new("test");
        store
            .register("app:type=Server", Bean::new().with_null("LastFailure"))
            .unwrap();
        store
            .set_value("app:type=Server", "LastFailure", Some("boom".into()))
            .unwrap();
        let name: ObjectName = "app:type=Server".parse().unwrap();
        assert_eq!(
            store.attribute(&name, "LastFailure").unwrap(),
            Some(Value::from("boom"))
        );

        assert!(store.unregister("app:type=Server").is_some());
        assert!(!store.contains(&name));
        assert!(store.set_value("app:type=Server", "LastFailure", None).is_err());
    }
}
