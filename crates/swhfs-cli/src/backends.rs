//! Wires the configured backend pair together (§4.2, §10.1: "the core is
//! agnostic to which pair is wired up; that choice is made once, at
//! startup, from configuration").

use std::sync::Arc;

use anyhow::{Context, Result};
use swhfs_backend::content::{ObjStorageBackend, WebApiContentBackend};
use swhfs_backend::graph::{CompressedGraphBackend, WebApiGraphBackend};
use swhfs_backend::{ContentBackend, GraphBackend};

use crate::config::Config;

pub fn build_graph_backend(config: &Config) -> Result<Arc<dyn GraphBackend>> {
    if let Some(grpc_url) = &config.graph.grpc_url {
        return Ok(Arc::new(CompressedGraphBackend::new(grpc_url.clone())));
    }
    let url = config
        .web_api
        .url
        .clone()
        .context("no `graph.grpc-url` and no `web-api.url` configured")?;
    Ok(Arc::new(WebApiGraphBackend::new(url, config.web_api.auth_token.clone())))
}

pub fn build_content_backend(config: &Config) -> Result<Arc<dyn ContentBackend>> {
    if let Some(storage) = &config.content.storage {
        return Ok(Arc::new(ObjStorageBackend::new(
            storage.clone(),
            config.content.objstorage.clone(),
        )));
    }
    let url = config
        .web_api
        .url
        .clone()
        .context("no `content.storage` and no `web-api.url` configured")?;
    Ok(Arc::new(WebApiContentBackend::new(url, config.web_api.auth_token.clone())))
}
