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

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ObjectMeta;

use crate::config::ServiceConfig;
use crate::consts::{CLUSTER_IP_NONE, PROTOCOL_TCP, SERVICE_TYPE_CLUSTER_IP};
use crate::utils::unordered_eq;

// Labels identifying the resources of the given NodeObservability.
pub fn labels_for_node_observability(
    config: &ServiceConfig,
    owner_name: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([(config.selector_label_key.clone(), owner_name.to_string())])
}

// Builds the headless agent Service for the given NodeObservability. Owner references are left
// for the caller to attach.
pub fn desired_service(config: &ServiceConfig, owner_name: &str, namespace: &str) -> Service {
    let labels = labels_for_node_observability(config, owner_name);
    let annotations = BTreeMap::from([(
        config.cert_annotation_key.clone(),
        config.cert_secret_name.clone(),
    )]);

    Service {
        metadata: ObjectMeta {
            name: Some(config.name.clone()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some(CLUSTER_IP_NONE.to_string()),
            type_: Some(SERVICE_TYPE_CLUSTER_IP.to_string()),
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                protocol: Some(PROTOCOL_TCP.to_string()),
                port: config.port,
                target_port: Some(IntOrString::Int(config.target_port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        status: None,
    }
}

// Returns a copy of `current` with every drifted field taken from `desired`, and whether anything
// drifted. Annotations are merged into the existing ones; owner references, ports, selector and
// type are replaced wholesale.
pub fn update_service(current: &Service, desired: &Service) -> (Service, bool) {
    let mut updated_svc = current.clone();
    let mut updated = false;

    if updated_svc.metadata.owner_references != desired.metadata.owner_references {
        updated_svc
            .metadata
            .owner_references
            .clone_from(&desired.metadata.owner_references);
        updated = true;
    }

    let default_spec = ServiceSpec::default();
    let desired_spec = desired.spec.as_ref().unwrap_or(&default_spec);
    let svc_spec = updated_svc.spec.get_or_insert_with(ServiceSpec::default);

    if !ports_match(
        svc_spec.ports.as_deref().unwrap_or_default(),
        desired_spec.ports.as_deref().unwrap_or_default(),
    ) {
        svc_spec.ports.clone_from(&desired_spec.ports);
        updated = true;
    }

    if !selector_match(svc_spec.selector.as_ref(), desired_spec.selector.as_ref()) {
        svc_spec.selector.clone_from(&desired_spec.selector);
        updated = true;
    }

    if svc_spec.type_ != desired_spec.type_ {
        svc_spec.type_.clone_from(&desired_spec.type_);
        updated = true;
    }

    if let Some(desired_annotations) = &desired.metadata.annotations {
        if merge_annotations(&mut updated_svc.metadata.annotations, desired_annotations) {
            updated = true;
        }
    }

    (updated_svc, updated)
}

// Sets every desired annotation on `current`, leaving annotations owned by others untouched.
// Returns true if any key was added or changed.
pub fn merge_annotations(
    current: &mut Option<BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> bool {
    if desired.is_empty() {
        return false;
    }

    let annotations = current.get_or_insert_with(BTreeMap::new);
    let mut updated = false;
    for (key, value) in desired {
        if annotations.get(key) != Some(value) {
            annotations.insert(key.clone(), value.clone());
            updated = true;
        }
    }
    updated
}

// Port lists match when, after sorting both by name, every entry has the same name, port, target
// port and protocol.
pub fn ports_match(current: &[ServicePort], desired: &[ServicePort]) -> bool {
    unordered_eq(current, desired, port_name, |c, d| {
        c.name == d.name
            && c.port == d.port
            && target_port_value(c) == target_port_value(d)
            && c.protocol == d.protocol
    })
}

// An absent selector is the same as an empty one.
pub fn selector_match(
    current: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> bool {
    match (current, desired) {
        (Some(c), Some(d)) => c == d,
        (Some(m), None) | (None, Some(m)) => m.is_empty(),
        (None, None) => true,
    }
}

fn port_name(port: &ServicePort) -> &str {
    port.name.as_deref().unwrap_or_default()
}

// Named and unset target ports count as 0.
fn target_port_value(port: &ServicePort) -> i32 {
    match port.target_port {
        Some(IntOrString::Int(value)) => value,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    const NS: &str = "node-observability-operator";

    fn port(name: &str, port: i32, protocol: &str) -> ServicePort {
        ServicePort {
            name: Some(name.to_string()),
            port,
            target_port: Some(IntOrString::Int(port)),
            protocol: Some(protocol.to_string()),
            ..ServicePort::default()
        }
    }

    fn owner_ref(name: &str, uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "nodeobservability.olm.openshift.io/v1alpha2".to_string(),
            kind: "NodeObservability".to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    fn desired() -> Service {
        let mut svc = desired_service(&ServiceConfig::default(), "cluster", NS);
        svc.metadata.owner_references = Some(vec![owner_ref("cluster", "uid-1")]);
        svc
    }

    fn with_ports(mut svc: Service, ports: Vec<ServicePort>) -> Service {
        svc.spec.as_mut().unwrap().ports = Some(ports);
        svc
    }

    #[test]
    fn desired_service_is_headless_cluster_ip() {
        let config = ServiceConfig::default();
        let svc = desired_service(&config, "cluster", NS);

        assert_eq!(svc.metadata.name.as_deref(), Some("node-observability-agent"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some(NS));
        assert!(svc.metadata.owner_references.is_none());

        let spec = svc.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));

        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8443);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8443)));
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
        assert!(ports[0].name.is_none());

        let expected_labels = BTreeMap::from([("nodeobs_cr".to_string(), "cluster".to_string())]);
        assert_eq!(spec.selector, Some(expected_labels.clone()));
        assert_eq!(svc.metadata.labels, Some(expected_labels));
        assert_eq!(
            svc.metadata.annotations,
            Some(BTreeMap::from([(
                "service.beta.openshift.io/serving-cert-secret-name".to_string(),
                "node-observability-agent".to_string(),
            )]))
        );
    }

    #[test]
    fn desired_service_is_deterministic() {
        let config = ServiceConfig::default();
        let first = serde_json::to_vec(&desired_service(&config, "cluster", NS)).unwrap();
        let second = serde_json::to_vec(&desired_service(&config, "cluster", NS)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn desired_service_follows_config() {
        let config = ServiceConfig {
            name: "agent".to_string(),
            port: 9000,
            target_port: 9001,
            cert_secret_name: "agent-tls".to_string(),
            selector_label_key: "app".to_string(),
            ..ServiceConfig::default()
        };
        let svc = desired_service(&config, "cluster", "observability");
        let spec = svc.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports[0].port, 9000);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(9001)));
        assert_eq!(spec.selector.unwrap().get("app").map(String::as_str), Some("cluster"));
        assert_eq!(
            svc.metadata
                .annotations
                .unwrap()
                .get(&config.cert_annotation_key)
                .map(String::as_str),
            Some("agent-tls")
        );
    }

    #[test]
    fn no_drift_reports_unchanged() {
        let desired = desired();
        let (updated, changed) = update_service(&desired, &desired);
        assert!(!changed);
        assert_eq!(updated, desired);
    }

    #[test]
    fn port_order_is_ignored() {
        let desired = with_ports(desired(), vec![port("a", 1, "TCP"), port("b", 2, "TCP")]);
        let current = with_ports(desired.clone(), vec![port("b", 2, "TCP"), port("a", 1, "TCP")]);

        let (updated, changed) = update_service(&current, &desired);
        assert!(!changed);
        // the current order is kept when nothing drifted
        assert_eq!(updated.spec.unwrap().ports.unwrap()[0].name.as_deref(), Some("b"));
    }

    #[test]
    fn single_port_drift_replaces_all_ports() {
        let desired = with_ports(desired(), vec![port("a", 1, "TCP"), port("b", 2, "TCP")]);
        let current = with_ports(desired.clone(), vec![port("b", 2, "TCP"), port("a", 1, "UDP")]);

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(updated.spec.unwrap().ports, desired.spec.unwrap().ports);
    }

    #[test]
    fn port_count_drift_is_detected() {
        let desired = desired();
        let mut ports = desired.spec.clone().unwrap().ports.unwrap();
        ports.push(port("metrics", 9090, "TCP"));
        let current = with_ports(desired.clone(), ports);

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(updated.spec.unwrap().ports.unwrap().len(), 1);
    }

    #[test]
    fn named_target_port_counts_as_zero() {
        let mut named = port("a", 1, "TCP");
        named.target_port = Some(IntOrString::String("https".to_string()));
        let mut zero = port("a", 1, "TCP");
        zero.target_port = Some(IntOrString::Int(0));
        let mut unset = port("a", 1, "TCP");
        unset.target_port = None;

        assert!(ports_match(&[named.clone()], &[zero]));
        assert!(ports_match(&[named.clone()], &[unset]));
        assert!(!ports_match(&[named], &[port("a", 1, "TCP")]));
    }

    #[test]
    fn selector_drift_is_replaced() {
        let desired = desired();
        let mut current = desired.clone();
        current.spec.as_mut().unwrap().selector = Some(BTreeMap::from([
            ("nodeobs_cr".to_string(), "cluster".to_string()),
            ("stale".to_string(), "true".to_string()),
        ]));

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(updated.spec.unwrap().selector, desired.spec.unwrap().selector);
    }

    #[test]
    fn empty_and_missing_selectors_match() {
        let empty = BTreeMap::new();
        assert!(selector_match(None, Some(&empty)));
        assert!(selector_match(Some(&empty), None));
        assert!(selector_match(None, None));

        let populated = BTreeMap::from([("a".to_string(), "b".to_string())]);
        assert!(!selector_match(None, Some(&populated)));
        assert!(!selector_match(Some(&empty), Some(&populated)));
    }

    #[test]
    fn type_drift_is_replaced() {
        let desired = desired();
        let mut current = desired.clone();
        current.spec.as_mut().unwrap().type_ = Some("NodePort".to_string());

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(updated.spec.unwrap().type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn owner_reference_drift_is_replaced() {
        let desired = desired();
        let mut current = desired.clone();
        current.metadata.owner_references = Some(vec![owner_ref("cluster", "uid-0")]);

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(
            updated.metadata.owner_references,
            desired.metadata.owner_references
        );
    }

    #[test]
    fn annotations_are_merged_not_replaced() {
        let mut current = BTreeMap::from([("x".to_string(), "1".to_string())]);
        let desired = BTreeMap::from([("y".to_string(), "2".to_string())]);
        let mut annotations = Some(current.clone());

        assert!(merge_annotations(&mut annotations, &desired));
        current.insert("y".to_string(), "2".to_string());
        assert_eq!(annotations, Some(current));
    }

    #[test]
    fn annotations_are_initialised_when_missing() {
        let desired = desired();
        let mut current = desired.clone();
        current.metadata.annotations = None;

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        assert_eq!(updated.metadata.annotations, desired.metadata.annotations);
    }

    #[test]
    fn changed_annotation_value_is_overwritten() {
        let desired = desired();
        let mut current = desired.clone();
        let annotations = current.metadata.annotations.as_mut().unwrap();
        annotations.insert(
            "service.beta.openshift.io/serving-cert-secret-name".to_string(),
            "other".to_string(),
        );
        annotations.insert("openshift.io/owned-by".to_string(), "someone".to_string());

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        let annotations = updated.metadata.annotations.unwrap();
        assert_eq!(
            annotations
                .get("service.beta.openshift.io/serving-cert-secret-name")
                .map(String::as_str),
            Some("node-observability-agent")
        );
        assert_eq!(
            annotations.get("openshift.io/owned-by").map(String::as_str),
            Some("someone")
        );
    }

    #[test]
    fn empty_desired_annotations_leave_current_alone() {
        let mut annotations = None;
        assert!(!merge_annotations(&mut annotations, &BTreeMap::new()));
        assert!(annotations.is_none());
    }

    #[test]
    fn every_drifted_group_is_merged() {
        let desired = desired();
        let mut current = desired.clone();
        current.metadata.owner_references = None;
        current.metadata.annotations = Some(BTreeMap::new());
        let spec = current.spec.as_mut().unwrap();
        spec.type_ = Some("LoadBalancer".to_string());
        spec.selector = None;
        spec.ports = Some(vec![port("", 8443, "UDP")]);

        let (updated, changed) = update_service(&current, &desired);
        assert!(changed);
        // labels and cluster IP are not compared; they already match here
        assert_eq!(updated, desired);
    }

    #[test]
    fn fields_outside_the_compared_set_are_kept() {
        let desired = desired();
        let mut current = desired.clone();
        current.metadata.resource_version = Some("42".to_string());
        current.metadata.labels = Some(BTreeMap::from([("team".to_string(), "a".to_string())]));
        current.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.1".to_string());

        let (updated, changed) = update_service(&current, &desired);
        assert!(!changed);
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(updated.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.1"));
    }
}
