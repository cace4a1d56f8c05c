use std::fmt;

use kube::Resource;

/// Identifies an object by namespace and name.
///
/// This is the unit of work of the runtime: watches produce keys, the queue
/// serializes on keys and reconcilers receive keys.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone)]
pub struct ObjectKey {
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    /// Create a key for a possibly cluster-scoped object.
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace,
            name: name.into(),
        }
    }

    /// Create a key for a namespaced object.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Name of the object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of the object, if it is namespaced.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl<R: Resource> From<&R> for ObjectKey {
    fn from(object: &R) -> ObjectKey {
        let meta = object.meta();
        ObjectKey {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
