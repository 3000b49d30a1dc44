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

use std::fmt;

use kube::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use nodeobservability_controller::controller as nodeobservability_controller;

pub mod config;
pub mod consts;
pub mod crd;
pub mod patch;
pub mod service_reconciler;
pub mod service_utils;
pub mod store;
pub mod utils;

mod nodeobservability_controller;

use config::OperatorConfig;
use service_reconciler::Step;

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator settings resolved from the command line
    pub config: OperatorConfig,
    /// Cancelled on shutdown; aborts in-flight API calls
    pub shutdown: CancellationToken,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    KubeError(#[source] kube::Error),
    #[error("invalid configuration: `{0}`")]
    InvalidConfigError(String),
    #[error("error querying NodeObservability CRD: `{0}`; is the CRD installed?")]
    CRDNotFoundError(#[source] kube::Error),
    #[error("failed to set the controller reference for service {key}: {reason}")]
    OwnerReferenceError { key: NamespacedName, reason: String },
    #[error("failed to {step} service {key}: {source}")]
    ServiceError {
        step: Step,
        key: NamespacedName,
        #[source]
        source: kube::Error,
    },
    #[error("service {key} not found on {step}")]
    ServiceNotFound { step: Step, key: NamespacedName },
    #[error("reconciliation of service {key} cancelled during {step}")]
    Cancelled { step: Step, key: NamespacedName },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespacedName {
    pub name: String,
    pub namespace: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
