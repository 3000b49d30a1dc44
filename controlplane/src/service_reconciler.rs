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

use std::{fmt, future::Future};

use k8s_openapi::api::core::v1::Service;
use kube::{Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::config::ServiceConfig;
use crate::service_utils::{desired_service, update_service};
use crate::store::{set_controller_reference, ServiceStore};
use crate::*;

/// An API call made while converging the Service, used to tell failures apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Read,
    Create,
    Update,
    Confirm,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Read => "get",
            Step::Create => "create",
            Step::Update => "update",
            Step::Confirm => "get existing",
        };
        f.write_str(s)
    }
}

// One convergence cycle moves through these states; each one either advances or returns an error.
enum State {
    Reading,
    Creating,
    Diffing(Service),
    Writing(Service),
    Confirming,
    Done(Service),
}

/// Keeps the agent Service of a NodeObservability converged to its desired state.
pub struct ServiceReconciler<S> {
    store: S,
    config: ServiceConfig,
}

impl<S: ServiceStore> ServiceReconciler<S> {
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Ensures the Service exists and matches the desired state, returning the Service as read
    /// back from the API server.
    ///
    /// An absent Service is created. An existing one is written only when it drifted. Every
    /// failure aborts the cycle; retrying is up to the caller.
    pub async fn ensure_service<K>(
        &self,
        cancel: &CancellationToken,
        owner: &K,
        namespace: &str,
    ) -> Result<Service>
    where
        K: Resource<DynamicType = ()>,
    {
        let mut desired = desired_service(&self.config, &owner.name_any(), namespace);
        set_controller_reference(owner, &mut desired)?;
        let key = NamespacedName::new(namespace, self.config.name.clone());

        let mut state = State::Reading;
        loop {
            state = match state {
                State::Reading => {
                    match guarded(cancel, Step::Read, &key, self.store.get(&key)).await? {
                        Some(current) => State::Diffing(current),
                        None => State::Creating,
                    }
                }
                State::Creating => {
                    guarded(cancel, Step::Create, &key, self.store.create(&desired)).await?;
                    info!(svc.name = %key.name, svc.namespace = %key.namespace, "successfully created service");
                    State::Confirming
                }
                State::Diffing(current) => {
                    let (updated, changed) = update_service(&current, &desired);
                    if changed {
                        info!(svc.name = %key.name, svc.namespace = %key.namespace, "drift detected; updating service");
                        State::Writing(updated)
                    } else {
                        debug!(svc.name = %key.name, svc.namespace = %key.namespace, "service is up to date");
                        State::Done(current)
                    }
                }
                State::Writing(updated) => {
                    guarded(cancel, Step::Update, &key, self.store.update(&updated)).await?;
                    info!(svc.name = %key.name, svc.namespace = %key.namespace, "successfully updated service");
                    State::Confirming
                }
                State::Confirming => {
                    match guarded(cancel, Step::Confirm, &key, self.store.get(&key)).await? {
                        Some(svc) => State::Done(svc),
                        None => {
                            return Err(Error::ServiceNotFound {
                                step: Step::Confirm,
                                key,
                            })
                        }
                    }
                }
                State::Done(svc) => return Ok(svc),
            };
        }
    }
}

// Runs an API call unless the cycle is cancelled first, attaching the step and Service to errors.
async fn guarded<T>(
    cancel: &CancellationToken,
    step: Step,
    key: &NamespacedName,
    call: impl Future<Output = std::result::Result<T, kube::Error>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled { step, key: key.clone() }),
        res = call => res.map_err(|source| Error::ServiceError { step, key: key.clone(), source }),
    }
}
