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

use controlplane::{config::Args, crd::NodeObservability, *};

use clap::Parser;
use kube::{Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.print_crd {
        print!("{}", serde_yaml::to_string(&NodeObservability::crd())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = args.into_config()?;
    let client = Client::try_default().await?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                signal.cancel();
            }
            Err(error) => error!("failed to listen for shutdown signal: {error:?}"),
        }
    });

    info!(namespace = %config.namespace, "starting NodeObservability controller");
    let ctx = Context {
        client,
        config,
        shutdown,
    };

    if let Err(error) = nodeobservability_controller(ctx).await {
        error!("failed to start controller: {error:?}");
        std::process::exit(1);
    }
    info!("controller terminated");
    Ok(())
}
