use std::collections::HashMap;
use std::fmt::Display;
use std::io::Error as IoError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::trace;

use pvc_types::Crd;
use pvc_types::InputK8Obj;
use pvc_types::K8List;
use pvc_types::K8Meta;
use pvc_types::K8Obj;
use pvc_types::ObjectMeta;
use pvc_types::Spec;
use pvc_types::UpdateK8ObjStatus;

use crate::MetadataClient;
use crate::MetadataClientError;
use crate::NameSpace;

#[derive(Debug, Error)]
pub enum InMemoryError {
    #[error("io: {0}")]
    IoError(#[from] IoError),
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),
    #[error("lock poison error")]
    LockPoisonError,
    #[error("patch error")]
    PatchError,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl MetadataClientError for InMemoryError {
    fn patch_error() -> Self {
        Self::PatchError
    }

    fn not_founded(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    crd: &'static Crd,
    ns: String,
    name: String,
}

impl ItemKey {
    fn new<S>(metadata: &dyn K8Meta) -> Self
    where
        S: Spec,
    {
        ItemKey {
            crd: S::metadata(),
            ns: metadata.namespace().to_owned(),
            name: metadata.name().to_owned(),
        }
    }

    fn label(&self) -> String {
        format!("{} {}/{}", self.crd.names.kind, self.ns, self.name)
    }
}

type ItemMap = HashMap<ItemKey, Value>;

/// Object store kept in process memory.
///
/// Objects are stored as json so that every read goes through the same
/// serde path as a real API server response.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    store: Arc<RwLock<ItemMap>>,
    version: AtomicU64,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

/// apply json merge patch (RFC 7386) to target
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    if value.is_null() {
                        target_map.remove(key);
                    } else {
                        merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

/// make sure metadata carries a fresh resource version
fn stamp_version(value: &mut Value, version: String) {
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert("resourceVersion".to_owned(), Value::String(version));
    }
}

#[async_trait]
impl MetadataClient for InMemoryClient {
    type MetadataClientError = InMemoryError;

    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        let item_key = ItemKey::new::<S>(metadata);
        let store = self.store.read().map_err(|_| InMemoryError::LockPoisonError)?;
        let item_value = store
            .get(&item_key)
            .ok_or_else(|| InMemoryError::NotFound(item_key.label()))?;
        Ok(serde_json::from_value(item_value.clone())?)
    }

    async fn retrieve_items<S, N>(&self, namespace: N) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        let namespace = namespace.into();
        let crd = S::metadata();
        let store = self.store.read().map_err(|_| InMemoryError::LockPoisonError)?;

        let mut keys: Vec<&ItemKey> = store
            .keys()
            .filter(|key| key.crd == crd && namespace.matches(&key.ns))
            .collect();
        keys.sort_by(|a, b| (&a.ns, &a.name).cmp(&(&b.ns, &b.name)));

        let mut list = K8List::new();
        for key in keys {
            list.items.push(serde_json::from_value(store[key].clone())?);
        }
        list.metadata.resource_version = self.version.load(Ordering::SeqCst).to_string();
        trace!("{}: listed {} items in {}", S::label(), list.items.len(), namespace.named());
        Ok(list)
    }

    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        let item_key = ItemKey::new::<S>(&value.metadata);
        let k8_obj: K8Obj<S> = K8Obj {
            api_version: value.api_version,
            kind: value.kind,
            metadata: ObjectMeta {
                name: value.metadata.name,
                namespace: value.metadata.namespace,
                labels: value.metadata.labels,
                annotations: value.metadata.annotations,
                resource_version: self.next_version(),
                ..Default::default()
            },
            spec: value.spec,
            header: value.header,
            status: S::Status::default(),
        };

        let item_value = serde_json::to_value(&k8_obj)?;
        let mut store = self.store.write().map_err(|_| InMemoryError::LockPoisonError)?;
        if store.contains_key(&item_key) {
            return Err(InMemoryError::AlreadyExists(item_key.label()));
        }
        debug!("{}: created", item_key.label());
        store.insert(item_key, item_value);

        Ok(k8_obj)
    }

    async fn update_status<S>(
        &self,
        update_k8_status: &UpdateK8ObjStatus<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        let item_key = ItemKey::new::<S>(&update_k8_status.metadata);
        let mut store = self.store.write().map_err(|_| InMemoryError::LockPoisonError)?;
        let item_value = store
            .get_mut(&item_key)
            .ok_or_else(|| InMemoryError::NotFound(item_key.label()))?;

        let mut k8_obj: K8Obj<S> = serde_json::from_value(item_value.clone())?;
        k8_obj.status = update_k8_status.status.clone();
        k8_obj.metadata.resource_version = self.next_version();

        *item_value = serde_json::to_value(&k8_obj)?;
        debug!("{}: status updated", item_key.label());

        Ok(k8_obj)
    }

    async fn patch_spec<S, M>(
        &self,
        metadata: &M,
        patch: &Value,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Display + Send + Sync,
    {
        if !patch.is_object() {
            return Err(InMemoryError::patch_error());
        }

        let item_key = ItemKey::new::<S>(metadata);
        let mut store = self.store.write().map_err(|_| InMemoryError::LockPoisonError)?;
        let item_value = store
            .get_mut(&item_key)
            .ok_or_else(|| InMemoryError::NotFound(item_key.label()))?;

        let mut patched = item_value.clone();
        merge_patch(&mut patched, patch);
        stamp_version(&mut patched, self.next_version());

        // reject patches that no longer decode as the resource type
        let k8_obj: K8Obj<S> = serde_json::from_value(patched.clone())?;
        *item_value = patched;
        debug!("{}: patched", metadata);
        trace!("{}: patch {}", metadata, patch);

        Ok(k8_obj)
    }
}
