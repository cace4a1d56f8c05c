use std::collections::{BTreeMap, HashMap};

use kube::error::ErrorResponse;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{namespace_and_name, ResourceStore, StoreError, StoreObject};

/// Operations on a [`MemoryStore`]. Writes are recorded, any of them can be
/// made to fail.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    /// [`ResourceStore::get`]
    Get,
    /// [`ResourceStore::list`]
    List,
    /// [`ResourceStore::create`]
    Create,
    /// [`ResourceStore::replace`]
    Replace,
    /// [`ResourceStore::replace_status`]
    ReplaceStatus,
    /// [`ResourceStore::delete`]
    Delete,
}

/// A write issued against a [`MemoryStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mutation {
    /// What was done.
    pub verb: Verb,
    /// Kind of the object, e.g. `Pod`.
    pub kind: String,
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object.
    pub name: String,
}

type Key = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    revision: u64,
    mutations: Vec<Mutation>,
    failures: HashMap<(Verb, String), Failure>,
}

#[derive(Clone, Copy, Debug)]
enum Failure {
    Server,
    Conflict,
}

impl State {
    fn check_failure(&self, verb: Verb, kind: &str) -> Result<(), StoreError> {
        match self.failures.get(&(verb, kind.to_owned())) {
            None => Ok(()),
            Some(Failure::Server) => Err(StoreError::Api(kube::Error::Api(ErrorResponse {
                status: "Failure".to_owned(),
                message: format!("injected {:?} failure for {}", verb, kind),
                reason: "InternalError".to_owned(),
                code: 500,
            }))),
            Some(Failure::Conflict) => Err(StoreError::Conflict(format!(
                "injected {:?} conflict for {}",
                verb, kind
            ))),
        }
    }

    fn record(&mut self, verb: Verb, key: &Key) {
        self.mutations.push(Mutation {
            verb,
            kind: key.0.clone(),
            namespace: key.1.clone(),
            name: key.2.clone(),
        });
    }

    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn check_revision(&self, key: &Key, requested: Option<&str>) -> Result<&Value, StoreError> {
        let stored = self
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(describe(key)))?;
        if let Some(requested) = requested {
            if stored["metadata"]["resourceVersion"].as_str() != Some(requested) {
                return Err(StoreError::Conflict(format!(
                    "{} was modified, resource version {} is stale",
                    describe(key),
                    requested
                )));
            }
        }
        Ok(stored)
    }
}

/// In-memory [`ResourceStore`] for tests.
///
/// Objects are stored as JSON keyed by kind, namespace and name. The store
/// assigns uids and resource versions, enforces optimistic concurrency,
/// garbage collects objects whose owner is deleted and records every write.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` as is, status included, without recording a mutation.
    /// Replaces any existing object with the same name.
    pub async fn insert<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let key = key_of(object)?;
        let mut value = serde_json::to_value(object)?;
        let mut state = self.state.lock().await;
        let revision = state.next_revision();
        let metadata = metadata_mut(&mut value)?;
        if !metadata.contains_key("uid") {
            metadata.insert("uid".to_owned(), Value::String(format!("uid-{}", revision)));
        }
        metadata.insert("resourceVersion".to_owned(), Value::String(revision));
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Every write since the store was created or last cleared.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().await.mutations.clone()
    }

    /// Forget recorded writes.
    pub async fn clear_mutations(&self) {
        self.state.lock().await.mutations.clear();
    }

    /// Make every `verb` on objects of `kind` fail with a server error.
    pub async fn inject_failure(&self, verb: Verb, kind: &str) {
        self.inject(verb, kind, Failure::Server).await;
    }

    /// Make every `verb` on objects of `kind` fail as if the object had been
    /// modified concurrently.
    pub async fn inject_conflict(&self, verb: Verb, kind: &str) {
        self.inject(verb, kind, Failure::Conflict).await;
    }

    async fn inject(&self, verb: Verb, kind: &str, failure: Failure) {
        self.state
            .lock()
            .await
            .failures
            .insert((verb, kind.to_owned()), failure);
    }

    /// Stop failing operations.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }
}

#[async_trait::async_trait]
impl ResourceStore for MemoryStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let key = (K::kind(&()).into_owned(), namespace.to_owned(), name.to_owned());
        let state = self.state.lock().await;
        state.check_failure(Verb::Get, &key.0)?;
        match state.objects.get(&key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let kind = K::kind(&());
        let state = self.state.lock().await;
        state.check_failure(Verb::List, &kind)?;
        state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && namespace.map_or(true, |n| n == ns.as_str()))
            .map(|(_, value)| Ok(serde_json::from_value(value.clone())?))
            .collect()
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let key = key_of(object)?;
        let mut value = serde_json::to_value(object)?;
        let mut state = self.state.lock().await;
        state.check_failure(Verb::Create, &key.0)?;
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(describe(&key)));
        }
        let revision = state.next_revision();
        if let Some(object) = value.as_object_mut() {
            object.remove("status");
        }
        let metadata = metadata_mut(&mut value)?;
        metadata.insert("uid".to_owned(), Value::String(format!("uid-{}", revision)));
        metadata.insert("resourceVersion".to_owned(), Value::String(revision));
        state.objects.insert(key.clone(), value.clone());
        state.record(Verb::Create, &key);
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let key = key_of(object)?;
        let mut value = serde_json::to_value(object)?;
        let mut state = self.state.lock().await;
        state.check_failure(Verb::Replace, &key.0)?;
        let stored = state.check_revision(&key, object.meta().resource_version.as_deref())?;
        let status = stored.get("status").cloned();
        let uid = stored["metadata"]["uid"].clone();
        let revision = state.next_revision();
        if let Some(object) = value.as_object_mut() {
            match status {
                Some(status) => object.insert("status".to_owned(), status),
                None => object.remove("status"),
            };
        }
        let metadata = metadata_mut(&mut value)?;
        metadata.insert("uid".to_owned(), uid);
        metadata.insert("resourceVersion".to_owned(), Value::String(revision));
        state.objects.insert(key.clone(), value.clone());
        state.record(Verb::Replace, &key);
        Ok(serde_json::from_value(value)?)
    }

    async fn replace_status<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let key = key_of(object)?;
        let status = serde_json::to_value(object)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        let mut state = self.state.lock().await;
        state.check_failure(Verb::ReplaceStatus, &key.0)?;
        let mut value = state
            .check_revision(&key, object.meta().resource_version.as_deref())?
            .clone();
        let revision = state.next_revision();
        if let Some(object) = value.as_object_mut() {
            object.insert("status".to_owned(), status);
        }
        metadata_mut(&mut value)?.insert("resourceVersion".to_owned(), Value::String(revision));
        state.objects.insert(key.clone(), value.clone());
        state.record(Verb::ReplaceStatus, &key);
        Ok(serde_json::from_value(value)?)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = (K::kind(&()).into_owned(), namespace.to_owned(), name.to_owned());
        let mut state = self.state.lock().await;
        state.check_failure(Verb::Delete, &key.0)?;
        let removed = state
            .objects
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound(describe(&key)))?;
        state.record(Verb::Delete, &key);

        let mut owners: Vec<String> = uid_of(&removed).into_iter().collect();
        while let Some(owner) = owners.pop() {
            let owned: Vec<Key> = state
                .objects
                .iter()
                .filter(|(_, value)| is_owned_by(value, &owner))
                .map(|(key, _)| key.clone())
                .collect();
            for key in owned {
                if let Some(value) = state.objects.remove(&key) {
                    owners.extend(uid_of(&value));
                }
            }
        }
        Ok(())
    }
}

fn key_of<K: StoreObject>(object: &K) -> Result<Key, StoreError> {
    let (namespace, name) = namespace_and_name(object)?;
    Ok((K::kind(&()).into_owned(), namespace, name))
}

fn describe(key: &Key) -> String {
    format!("{} {}/{}", key.0, key.1, key.2)
}

fn metadata_mut(value: &mut Value) -> Result<&mut Map<String, Value>, StoreError> {
    value
        .as_object_mut()
        .map(|object| {
            object
                .entry("metadata")
                .or_insert_with(|| Value::Object(Map::new()))
        })
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StoreError::Invalid("object has no metadata".to_owned()))
}

fn uid_of(value: &Value) -> Option<String> {
    value["metadata"]["uid"].as_str().map(str::to_owned)
}

fn is_owned_by(value: &Value, owner: &str) -> bool {
    value["metadata"]["ownerReferences"]
        .as_array()
        .map(|references| {
            references
                .iter()
                .any(|reference| reference["uid"].as_str() == Some(owner))
        })
        .unwrap_or(false)
}
