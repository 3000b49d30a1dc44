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

use std::time::Duration;

use clap::Parser;

use crate::consts::*;
use crate::{Error, Result};

/// Parameters of the agent Service built for every NodeObservability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub port: i32,
    pub target_port: i32,
    /// Annotation key requesting a serving certificate.
    pub cert_annotation_key: String,
    /// Secret the serving certificate is written to.
    pub cert_secret_name: String,
    /// Label key carrying the owner's name, used as label and selector.
    pub selector_label_key: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: AGENT_NAME.to_string(),
            port: AGENT_SERVICE_PORT,
            target_port: AGENT_TARGET_PORT,
            cert_annotation_key: INJECT_CERTS_ANNOTATION.to_string(),
            cert_secret_name: AGENT_NAME.to_string(),
            selector_label_key: NODE_OBSERVABILITY_LABEL.to_string(),
        }
    }
}

impl ServiceConfig {
    // Checks everything the builder relies on, so building a Service can't fail later.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("service name", &self.name),
            ("certificate annotation key", &self.cert_annotation_key),
            ("certificate secret name", &self.cert_secret_name),
            ("selector label key", &self.selector_label_key),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidConfigError(format!("{field} must not be empty")));
            }
        }
        for (field, port) in [("port", self.port), ("target port", self.target_port)] {
            if !(1..=65535).contains(&port) {
                return Err(Error::InvalidConfigError(format!(
                    "{field} {port} is out of range 1-65535"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace the agent Service lives in.
    pub namespace: String,
    pub service: ServiceConfig,
    pub requeue: Duration,
    pub error_requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: NODE_OBSERVABILITY_NAMESPACE.to_string(),
            service: ServiceConfig::default(),
            requeue: Duration::from_secs(DEFAULT_REQUEUE_SECS),
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[clap(version, about = "NodeObservability agent Service controller")]
pub struct Args {
    #[clap(long, env = "OPERATOR_NAMESPACE", default_value = NODE_OBSERVABILITY_NAMESPACE)]
    pub namespace: String,
    #[clap(long, default_value = AGENT_NAME)]
    pub service_name: String,
    #[clap(long, default_value_t = AGENT_SERVICE_PORT)]
    pub service_port: i32,
    #[clap(long, default_value_t = AGENT_TARGET_PORT)]
    pub target_port: i32,
    #[clap(long, default_value = AGENT_NAME)]
    pub cert_secret_name: String,
    #[clap(long, default_value_t = DEFAULT_REQUEUE_SECS)]
    pub requeue_secs: u64,
    #[clap(long, default_value_t = DEFAULT_ERROR_REQUEUE_SECS)]
    pub error_requeue_secs: u64,
    /// Print the NodeObservability CRD as YAML and exit.
    #[clap(long)]
    pub print_crd: bool,
}

impl Args {
    pub fn into_config(self) -> Result<OperatorConfig> {
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfigError(
                "namespace must not be empty".to_string(),
            ));
        }
        let service = ServiceConfig {
            name: self.service_name,
            port: self.service_port,
            target_port: self.target_port,
            cert_secret_name: self.cert_secret_name,
            ..ServiceConfig::default()
        };
        service.validate()?;

        Ok(OperatorConfig {
            namespace: self.namespace,
            service,
            requeue: Duration::from_secs(self.requeue_secs),
            error_requeue: Duration::from_secs(self.error_requeue_secs),
        })
    }
}
