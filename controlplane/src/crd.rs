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

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// NodeObservability requests profiling agents on the selected nodes. Every
/// NodeObservability owns the agent Service in the operator namespace.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "nodeobservability.olm.openshift.io",
    version = "v1alpha2",
    kind = "NodeObservability",
    plural = "nodeobservabilities",
    shortname = "nob"
)]
#[serde(rename_all = "camelCase")]
pub struct NodeObservabilitySpec {
    /// Labels selecting the nodes to run the agent on.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(rename = "type", default)]
    pub type_: NodeObservabilityType,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum NodeObservabilityType {
    #[default]
    #[serde(rename = "crio-kubelet")]
    CrioKubelet,
}
