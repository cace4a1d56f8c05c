use kube::api::{DeleteParams, ListParams, PostParams};
use kube::error::ErrorResponse;
use kube::Api;
use tracing::debug;

use super::{namespace_and_name, ResourceStore, StoreError, StoreObject};

/// [`ResourceStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: kube::Client,
}

impl KubeStore {
    /// Create a store using `client`.
    pub fn new(client: kube::Client) -> Self {
        KubeStore { client }
    }

    fn api<K: StoreObject>(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        match self.api::<K>(Some(namespace)).get(name).await {
            Ok(object) => Ok(Some(object)),
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let list = self.api::<K>(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = namespace_and_name(object)?;
        debug!(kind = %K::kind(&()), %namespace, %name, "Creating object.");
        Ok(self
            .api::<K>(Some(&namespace))
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn replace<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = namespace_and_name(object)?;
        debug!(kind = %K::kind(&()), %namespace, %name, "Replacing object.");
        Ok(self
            .api::<K>(Some(&namespace))
            .replace(&name, &PostParams::default(), object)
            .await?)
    }

    async fn replace_status<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = namespace_and_name(object)?;
        debug!(kind = %K::kind(&()), %namespace, %name, "Replacing object status.");
        let data = serde_json::to_vec(object)?;
        Ok(self
            .api::<K>(Some(&namespace))
            .replace_status(&name, &PostParams::default(), data)
            .await?)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        debug!(kind = %K::kind(&()), %namespace, %name, "Deleting object.");
        self.api::<K>(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
