//! Plugin context types

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared object type stored in the [`ObjectPool`]
pub type SharedObject = Arc<dyn Any + Send + Sync>;

struct PoolEntry {
    owner: String,
    name: String,
    object: SharedObject,
}

/// Pool of named objects plugins publish for each other
///
/// Providers add objects during `initialize`; consumers look them up in
/// `extensions_initialized`, when every provider has finished its own setup.
/// Objects are released automatically when their owning plugin is deleted.
#[derive(Default)]
pub struct ObjectPool {
    entries: Vec<PoolEntry>,
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("objects", &self.names())
            .finish()
    }
}

impl ObjectPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object on behalf of `owner`
    pub fn add(&mut self, owner: impl Into<String>, name: impl Into<String>, object: SharedObject) {
        self.entries.push(PoolEntry {
            owner: owner.into(),
            name: name.into(),
            object,
        });
    }

    /// Get the first object registered under `name` that has type `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .iter()
            .filter(|entry| entry.name == name)
            .find_map(|entry| Arc::clone(&entry.object).downcast::<T>().ok())
    }

    /// Get every object of type `T`, in registration order
    pub fn all<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.entries
            .iter()
            .filter_map(|entry| Arc::clone(&entry.object).downcast::<T>().ok())
            .collect()
    }

    /// Check whether an object is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Names of all registered objects, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Remove every object owned by `owner`, returning how many were removed
    pub fn remove_owned_by(&mut self, owner: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != owner);
        before - self.entries.len()
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context handed to a plugin's lifecycle hooks
#[derive(Debug)]
pub struct PluginContext<'a> {
    plugin: &'a str,
    arguments: &'a [String],
    objects: &'a mut ObjectPool,
}

impl<'a> PluginContext<'a> {
    /// Create a context for `plugin`
    pub fn new(plugin: &'a str, arguments: &'a [String], objects: &'a mut ObjectPool) -> Self {
        Self {
            plugin,
            arguments,
            objects,
        }
    }

    /// Name of the plugin this context belongs to
    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    /// Raw `key=value` options passed on the command line for this plugin
    pub fn arguments(&self) -> &[String] {
        self.arguments
    }

    /// Look up the value of option `key`
    ///
    /// A bare `key` without `=` yields an empty value.
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.iter().find_map(|arg| match arg.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if arg == key => Some(""),
            _ => None,
        })
    }

    /// Publish an object owned by this plugin
    pub fn add_object<T: Any + Send + Sync>(&mut self, name: impl Into<String>, object: Arc<T>) {
        self.objects.add(self.plugin, name, object);
    }

    /// Read-only access to the object pool
    pub fn objects(&self) -> &ObjectPool {
        self.objects
    }

    /// Look up an object by name and type
    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.objects.get(name)
    }
}
