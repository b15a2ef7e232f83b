// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Catalog of the components shipped with the server
//!
//! The loader picks from this catalog whatever the configured names and
//! location globs select.

use futures::{FutureExt, future::BoxFuture};
use sample_data::{SampleStore, SeedClient};
use tracing::info;

use crate::{
    dependencies::{Catalog, ComponentFactory, Context, Instance, LoadResult},
    error::LoadError,
    services::InsertData,
};

/// Injectable name of the [`SampleStore`]
pub const SAMPLE_STORE: &str = "sampleStore";

/// Injectable name of the [`SeedClient`]
pub const SEED_CLIENT: &str = "seedClient";

/// Every component shipped with the server
pub fn catalog() -> Catalog {
    Catalog::new()
        .register(ComponentFactory::injectable(
            SAMPLE_STORE,
            "data/sample_store.injectable",
            &[],
            build_sample_store,
        ))
        .register(ComponentFactory::injectable(
            SEED_CLIENT,
            "data/seed_client.injectable",
            &[],
            build_seed_client,
        ))
        .register(InsertData::factory())
}

fn construct_error(name: &str, error: impl std::fmt::Display) -> LoadError {
    LoadError::Construct {
        name: name.to_string(),
        message: error.to_string(),
    }
}

async fn sample_store(context: &Context) -> LoadResult<Instance> {
    let database = &context.config().database;
    let store = SampleStore::connect(&database.url, database.max_connections)
        .await
        .map_err(|e| construct_error(SAMPLE_STORE, e))?;
    store
        .migrate()
        .await
        .map_err(|e| construct_error(SAMPLE_STORE, e))?;

    info!(url = %database.url, "sample data store ready");
    Ok(Instance::injectable(store))
}

fn build_sample_store(context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    sample_store(context).boxed()
}

fn build_seed_client(context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    let client = SeedClient::new(&context.config().seed.url)
        .map(Instance::injectable)
        .map_err(|e| construct_error(SEED_CLIENT, e));
    async move { client }.boxed()
}
