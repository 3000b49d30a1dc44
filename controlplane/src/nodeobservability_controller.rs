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

use futures::StreamExt;
use std::{ops::Sub, sync::Arc, time::Instant};

use crate::crd::NodeObservability;
use crate::service_reconciler::ServiceReconciler;
use crate::store::KubeServiceStore;
use crate::*;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams},
    runtime::{controller::Action, watcher::Config, Controller},
    ResourceExt,
};

use tracing::*;

pub async fn reconcile(nodeobs: Arc<NodeObservability>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let name = nodeobs
        .metadata
        .name
        .clone()
        .ok_or(Error::InvalidConfigError("invalid name".to_string()))?;

    if nodeobs.metadata.deletion_timestamp.is_some() {
        // the Service goes away with its owner
        debug!("NodeObservability {:?} is being deleted", name);
        return Ok(Action::await_change());
    }

    let reconciler = ServiceReconciler::new(
        KubeServiceStore::new(ctx.client.clone()),
        ctx.config.service.clone(),
    );
    let svc = reconciler
        .ensure_service(&ctx.shutdown, nodeobs.as_ref(), &ctx.config.namespace)
        .await?;
    debug!(
        svc.name = %svc.name_any(),
        svc.resource_version = ?svc.resource_version(),
        "agent service ready for NodeObservability {:?}",
        name
    );

    let duration = Instant::now().sub(start);
    info!("finished reconciling in {:?} ms", duration.as_millis());
    Ok(Action::requeue(ctx.config.requeue))
}

pub async fn controller(ctx: Context) -> Result<()> {
    let nodeobs_api = Api::<NodeObservability>::all(ctx.client.clone());
    nodeobs_api
        .list(&ListParams::default().limit(1))
        .await
        .map_err(Error::CRDNotFoundError)?;

    let service_api = Api::<Service>::namespaced(ctx.client.clone(), &ctx.config.namespace);
    let shutdown = ctx.shutdown.clone();

    Controller::new(nodeobs_api, Config::default().any_semantic())
        .owns(service_api, Config::default())
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile, error_policy, Arc::new(ctx))
        .for_each(|res| async move {
            if let Err(error) = res {
                debug!("controller event error: {:?}", error);
            }
        })
        .await;

    Ok(())
}

fn error_policy(_: Arc<NodeObservability>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {}", error);
    Action::requeue(ctx.config.error_requeue)
}
