use std::fmt::Debug;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use kube::api::ListParams;
use kube::{Api, Resource};
use kube_runtime::watcher::Event;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::object::ObjectKey;

/// Pause after a failed watch request before polling the stream again.
const WATCH_ERROR_DELAY: Duration = Duration::from_secs(1);

struct PrettyEvent<'a, K>(&'a Event<K>);

impl<'a, K: Resource> std::fmt::Debug for PrettyEvent<'a, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Event::Applied(object) => write!(f, "Applied {}", ObjectKey::from(object)),
            Event::Deleted(object) => write!(f, "Deleted {}", ObjectKey::from(object)),
            Event::Restarted(objects) => write!(f, "Restarted with {} objects", objects.len()),
        }
    }
}

/// Stream changes to objects of kind `K` and forward the keys produced by
/// `mapper` to the work queue.
///
/// Deletions are forwarded as well: the reconciler finds the object gone and
/// settles on that.
pub(crate) async fn launch_watcher<K, F>(
    api: Api<K>,
    list_params: ListParams,
    mapper: F,
    tx: Sender<ObjectKey>,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default,
    F: Fn(&K) -> Option<ObjectKey> + Send + Sync + 'static,
{
    info!(
        kind = %K::kind(&Default::default()),
        "Starting Watcher."
    );
    let mut watcher = kube_runtime::watcher(api, list_params).boxed();
    loop {
        match watcher.try_next().await {
            Ok(Some(event)) => {
                debug!(event = ?PrettyEvent(&event), "Handling watch event.");
                let objects = match event {
                    Event::Applied(object) | Event::Deleted(object) => vec![object],
                    Event::Restarted(objects) => objects,
                };
                for key in objects.iter().filter_map(|object| mapper(object)) {
                    if tx.send(key).await.is_err() {
                        warn!("Work queue closed, stopping watcher.");
                        return;
                    }
                }
            }
            Ok(None) => break,
            Err(error) => {
                warn!(?error, "Error streaming object events.");
                tokio::time::sleep(WATCH_ERROR_DELAY).await;
            }
        }
    }
}
