//! Defines types for registering watches and running a reconciler.

use std::fmt::Debug;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use kube::api::{ListParams, ObjectMeta};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::object::ObjectKey;
use crate::reconciler::Reconciler;

mod queue;
pub use queue::{Settings, WorkQueue};
mod watch;
use watch::launch_watcher;

/// Wires watches of the primary kind, owned kinds and related kinds into a
/// single work queue, and is the main entrypoint for starting a controller.
pub struct Manager<R> {
    client: kube::Client,
    queue: WorkQueue<R>,
    owner: Option<(String, String)>,
    watchers: Vec<BoxFuture<'static, ()>>,
}

impl<R: Reconciler> Manager<R> {
    /// Create a new controller manager.
    pub fn new(client: kube::Client, reconciler: Arc<R>, settings: Settings) -> Self {
        Manager {
            client,
            queue: WorkQueue::new(reconciler, settings),
            owner: None,
            watchers: vec![],
        }
    }

    /// Watch the primary kind. Every change enqueues the object's own key.
    pub fn manages<K>(mut self, namespace: Option<&str>, list_params: ListParams) -> Self
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    {
        self.owner = Some((K::api_version(&()).into_owned(), K::kind(&()).into_owned()));
        let api = api_for::<K>(self.client.clone(), namespace);
        let tx = self.queue.sender();
        self.watchers.push(
            launch_watcher(api, list_params, |object: &K| Some(ObjectKey::from(object)), tx)
                .boxed(),
        );
        self
    }

    /// Watch a kind created by the reconciler. Changes enqueue the key of
    /// the controlling owner of the primary kind.
    ///
    /// Must be called after [`Manager::manages`].
    pub fn owns<K>(mut self, namespace: Option<&str>, list_params: ListParams) -> Self
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    {
        let (api_version, kind) = match self.owner.clone() {
            Some(owner) => owner,
            None => {
                warn!(
                    kind = %K::kind(&()),
                    "No managed kind registered, ignoring owned kind."
                );
                return self;
            }
        };
        let api = api_for::<K>(self.client.clone(), namespace);
        let tx = self.queue.sender();
        let mapper = move |object: &K| controller_owner_key(object.meta(), &api_version, &kind);
        self.watchers
            .push(launch_watcher(api, list_params, mapper, tx).boxed());
        self
    }

    /// Watch an arbitrary kind, enqueueing whatever key `mapper` derives.
    pub fn watches<K, F>(mut self, namespace: Option<&str>, list_params: ListParams, mapper: F) -> Self
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
        F: Fn(&K) -> Option<ObjectKey> + Send + Sync + 'static,
    {
        let api = api_for::<K>(self.client.clone(), namespace);
        let tx = self.queue.sender();
        self.watchers
            .push(launch_watcher(api, list_params, mapper, tx).boxed());
        self
    }

    /// Start the manager, blocking forever.
    pub async fn start(self) {
        info!(watches = self.watchers.len(), "Starting manager.");
        futures::future::join(self.queue.run(), futures::future::join_all(self.watchers)).await;
    }
}

fn api_for<K>(client: kube::Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Key of the object controlling `meta`, if the controller is of the given
/// api version and kind.
pub fn controller_owner_key(meta: &ObjectMeta, api_version: &str, kind: &str) -> Option<ObjectKey> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|owner| {
            owner.controller == Some(true) && owner.api_version == api_version && owner.kind == kind
        })
        .map(|owner| ObjectKey::new(meta.namespace.clone(), owner.name.clone()))
}
