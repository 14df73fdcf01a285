use std::fmt::Display;
use std::io::Error as IoError;

use async_trait::async_trait;
use serde_json::Error as SerdeJsonError;
use serde_json::Value;
use tracing::debug;

use pvc_types::{InputK8Obj, K8List, K8Meta, K8Obj, Spec, UpdateK8ObjStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameSpace {
    All,
    Named(String),
}

impl NameSpace {
    pub fn named(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Named(name) => name,
        }
    }

    /// true if object in `namespace` is visible through this selector
    pub fn matches(&self, namespace: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => name == namespace,
        }
    }
}

impl From<String> for NameSpace {
    fn from(namespace: String) -> Self {
        NameSpace::Named(namespace)
    }
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        NameSpace::Named(namespace.to_owned())
    }
}

impl From<Option<String>> for NameSpace {
    fn from(namespace: Option<String>) -> Self {
        match namespace {
            Some(ns) => NameSpace::Named(ns),
            None => NameSpace::All,
        }
    }
}

/// trait for metadata client errors
pub trait MetadataClientError: std::error::Error + Send + Sync + 'static {
    /// object was not found
    fn not_founded(&self) -> bool;

    // create new patch error
    fn patch_error() -> Self;
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    type MetadataClientError: MetadataClientError + From<IoError> + From<SerdeJsonError>;

    /// retrieval a single item
    async fn retrieve_item<S, M>(
        &self,
        metadata: &M,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync;

    /// retrieve all items in namespace as single chunk
    async fn retrieve_items<S, N>(
        &self,
        namespace: N,
    ) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync;

    /// create new object
    async fn create_item<S>(
        &self,
        value: InputK8Obj<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec;

    /// update status
    async fn update_status<S>(
        &self,
        value: &UpdateK8ObjStatus<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec;

    /// patch existing object, `patch` is a json merge patch against the whole object
    async fn patch_spec<S, M>(
        &self,
        metadata: &M,
        patch: &Value,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Display + Send + Sync;

    /// Check if the object exists, return true or false.
    async fn exists<S, M>(&self, metadata: &M) -> Result<bool, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Display + Send + Sync,
    {
        debug!("check if '{}' exists", metadata);
        match self.retrieve_item::<S, M>(metadata).await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.not_founded() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }
}
