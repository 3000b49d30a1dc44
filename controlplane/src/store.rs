/*
Copyright 2024 The Kubernetes Authors.

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
#[cfg(test)]
use mockall::automock;
use kube::{
    api::{Api, PostParams},
    Client, Resource, ResourceExt,
};

use crate::*;

/// Reads and writes Services on the API server.
///
/// Abstracted so the reconciler can run against a mock in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Fetch a Service; `Ok(None)` when it does not exist.
    async fn get(&self, key: &NamespacedName) -> Result<Option<Service>, kube::Error>;

    async fn create(&self, svc: &Service) -> Result<(), kube::Error>;

    /// Replace a Service. The object's resourceVersion makes this fail with a conflict if the
    /// Service changed since it was read.
    async fn update(&self, svc: &Service) -> Result<(), kube::Error>;
}

pub struct KubeServiceStore {
    client: Client,
}

impl KubeServiceStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, svc: &Service) -> Api<Service> {
        match svc.namespace() {
            Some(ns) => Api::namespaced(self.client.clone(), &ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

#[async_trait]
impl ServiceStore for KubeServiceStore {
    async fn get(&self, key: &NamespacedName) -> Result<Option<Service>, kube::Error> {
        let service_api: Api<Service> = Api::namespaced(self.client.clone(), &key.namespace);
        service_api.get_opt(&key.name).await
    }

    async fn create(&self, svc: &Service) -> Result<(), kube::Error> {
        self.api(svc).create(&PostParams::default(), svc).await?;
        Ok(())
    }

    async fn update(&self, svc: &Service) -> Result<(), kube::Error> {
        self.api(svc)
            .replace(&svc.name_any(), &PostParams::default(), svc)
            .await?;
        Ok(())
    }
}

// Marks `owner` as the controller of the Service so it is garbage collected with its owner.
pub fn set_controller_reference<K>(owner: &K, svc: &mut Service) -> Result<()>
where
    K: Resource<DynamicType = ()>,
{
    let key = NamespacedName::new(svc.namespace().unwrap_or_default(), svc.name_any());
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| Error::OwnerReferenceError {
            key,
            reason: format!(
                "{} {:?} has no name or uid",
                K::kind(&()),
                owner.meta().name
            ),
        })?;
    svc.metadata.owner_references = Some(vec![owner_ref]);
    Ok(())
}
