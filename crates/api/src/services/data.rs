// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `InsertData` service
//!
//! `POST /data` reseeds the `sampleData` table from the remote collection and
//! `GET /data?page=N` reads one page of it.

use std::{borrow::Cow, sync::Arc};

use axum::http::Method;
use futures::{FutureExt, future::BoxFuture};
use sample_data::{SampleStore, SeedClient};
use serde_json::{Value, json};
use shared_types::{DataRow, GenericError, SuccessfulResponse};
use tracing::{Instrument, Span, error, info};
use utoipa::{
    OpenApi, PartialSchema, ToSchema,
    openapi::{
        RefOr,
        schema::{ObjectBuilder, Schema, Type},
    },
};

use crate::{
    components::{SAMPLE_STORE, SEED_CLIENT},
    dependencies::{ComponentFactory, Context, Instance, LoadResult},
    helpers::{RequestHelper, ResponseHelper},
    service::{RouteSpec, Service, ServiceError, ServiceResult},
};

/// Registered service name
pub const NAME: &str = "InsertData";

/// Pseudo path matched by service location globs
pub const LOCATION: &str = "services/data/insert_data.service";

const CREATE_NEW_DATA: &str = "createNewData";
const FETCH_INSERT_DATA: &str = "fetchInsertData";

/// Message answered once a reseed completed
pub const INSERTED_MESSAGE: &str = "All Data has been Inserted.";

/// Any JSON object, accepted and logged by the create operation
pub struct NewData;

impl PartialSchema for NewData {
    fn schema() -> RefOr<Schema> {
        RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .description(Some("Any JSON object"))
                .build(),
        ))
    }
}

impl ToSchema for NewData {
    fn name() -> Cow<'static, str> {
        Cow::Borrowed("NewData")
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(create_new_data, fetch_insert_data),
    components(schemas(NewData, SuccessfulResponse, GenericError, DataRow)),
    tags((name = "data-services", description = "Sample data seeding and paging"))
)]
struct InsertDataDoc;

/// Seeds and pages the sample data table
#[derive(Debug, Clone)]
pub struct InsertData {
    store: Arc<SampleStore>,
    seeder: Arc<SeedClient>,
    seed_on_listen: bool,
    span: Span,
}

impl InsertData {
    /// Create the service from its collaborators
    pub fn new(store: Arc<SampleStore>, seeder: Arc<SeedClient>, seed_on_listen: bool) -> Self {
        Self {
            store,
            seeder,
            seed_on_listen,
            span: Span::current(),
        }
    }

    /// Build the service from a loader context
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the store or the seed client is missing.
    pub fn from_context(context: &Context) -> LoadResult<Self> {
        let mut service = Self::new(
            context.get::<SampleStore>(SAMPLE_STORE)?,
            context.get::<SeedClient>(SEED_CLIENT)?,
            context.config().seed.on_listen,
        );
        service.span = context.logger(NAME);
        Ok(service)
    }

    /// Catalog registration of the service
    pub const fn factory() -> ComponentFactory {
        ComponentFactory::service(NAME, LOCATION, &[SAMPLE_STORE, SEED_CLIENT], build)
    }
}

fn build(context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async move { InsertData::from_context(context).map(Instance::service) }.boxed()
}

/// Reseed the sample data table
///
/// Fetches the remote collection and inserts every record; records that fail
/// to insert are skipped.
#[utoipa::path(
    post,
    path = "/data",
    tag = "data-services",
    description = "Create a new data in the database or system.",
    request_body = NewData,
    security(("openIdConnect" = ["create:data"])),
    responses(
        (status = 200, description = "New data has been created successfully.", body = SuccessfulResponse),
        (status = 400, description = "New data url has been failed, due to bad or invalid request.", body = GenericError),
        (status = 401, description = "New data url has been failed, due to missing/incorrect authorization.", body = GenericError),
        (status = 403, description = "New data url has been failed, due to insufficient authentication.", body = GenericError)
    )
)]
async fn create_new_data(service: &InsertData, request: &RequestHelper) -> ServiceResult<Option<Value>> {
    info!(payload = ?request.payload(), "received request for creating new data");

    service
        .seeder
        .seed_all(&service.store)
        .await
        .inspect_err(|e| error!(error = %e, "failed to create new data"))?;

    Ok(Some(json!({
        "status": true,
        "msg": INSERTED_MESSAGE,
        "data": {},
    })))
}

/// Read one page of the sample data table
#[utoipa::path(
    get,
    path = "/data",
    tag = "data-services",
    description = "Fetch all the list of categories in the system",
    params(
        ("page" = Option<String>, Query, description = "page listing")
    ),
    security(("openIdConnect" = ["read:data"])),
    responses(
        (status = 200, description = "InsertData has been fetched successfully.", body = SuccessfulResponse),
        (status = 400, description = "File fetch has been Failed, due to invalid or bad request.", body = GenericError),
        (status = 401, description = "Data fetch has been Failed, due to missing/incorrect authentication.", body = GenericError),
        (status = 403, description = "Data fetch has been Failed, due to insufficient authorization.", body = GenericError)
    )
)]
async fn fetch_insert_data(service: &InsertData, request: &RequestHelper) -> ServiceResult<Option<Value>> {
    info!(page = ?request.query_param("page"), "received request for fetching data");

    let page = parse_page(request.query_param("page"))?;
    let rows = service.store.fetch_page(page).await?;
    Ok(Some(serde_json::to_value(rows)?))
}

/// Page number of a `page` query value; missing or empty reads the first page
///
/// # Errors
///
/// Returns `ServiceError::BadRequest` for a value that is not a non-negative
/// integer.
pub fn parse_page(raw: Option<&str>) -> ServiceResult<u32> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(value) => value.parse().map_err(|_| ServiceError::BadRequest {
            message: format!("page must be a non-negative integer, got {value:?}"),
        }),
    }
}

impl Service for InsertData {
    fn name(&self) -> &str {
        NAME
    }

    fn openapi(&self) -> utoipa::openapi::OpenApi {
        InsertDataDoc::openapi()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![
            RouteSpec::new(Method::POST, "/data")
                .service_method(format!("{NAME}.{CREATE_NEW_DATA}"))
                .middleware("STANDARD.json"),
            RouteSpec::new(Method::GET, "/data")
                .service_method(format!("{NAME}.{FETCH_INSERT_DATA}"))
                .middleware("STANDARD.json"),
        ]
    }

    fn methods(&self) -> &[&'static str] {
        &[CREATE_NEW_DATA, FETCH_INSERT_DATA]
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        request: &'a RequestHelper,
        _response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
        let span = self.span.clone();
        match method {
            CREATE_NEW_DATA => create_new_data(self, request).instrument(span).boxed(),
            FETCH_INSERT_DATA => fetch_insert_data(self, request).instrument(span).boxed(),
            other => {
                let error = ServiceError::UnknownMethod {
                    service: NAME.to_string(),
                    method: other.to_string(),
                };
                async move { Err(error) }.boxed()
            }
        }
    }

    fn on_listening(&self) -> Option<BoxFuture<'static, ()>> {
        if !self.seed_on_listen {
            return None;
        }
        let store = Arc::clone(&self.store);
        let seeder = Arc::clone(&self.seeder);
        let hook = async move {
            if let Err(e) = seeder.seed_all(&store).await {
                error!(error = %e, "failed to seed sample data on listen");
            }
        };
        Some(hook.instrument(self.span.clone()).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{middleware::MiddlewareRegistry, openapi::ApiDefinition, service::ServiceRegistry};

    async fn service(seed_url: &str) -> InsertData {
        let store = SampleStore::connect("sqlite::memory:", 1).await.unwrap();
        store.migrate().await.unwrap();
        InsertData::new(
            Arc::new(store),
            Arc::new(SeedClient::new(seed_url).unwrap()),
            false,
        )
    }

    #[test]
    fn page_parsing() {
        assert_eq!(parse_page(None).unwrap(), 1);
        assert_eq!(parse_page(Some("")).unwrap(), 1);
        assert_eq!(parse_page(Some("2")).unwrap(), 2);
        assert_eq!(parse_page(Some("0")).unwrap(), 0);
        assert!(matches!(
            parse_page(Some("two")),
            Err(ServiceError::BadRequest { .. })
        ));
        assert!(parse_page(Some("-1")).is_err());
    }

    #[tokio::test]
    async fn routes_bind_against_documentation() {
        let mut services = ServiceRegistry::default();
        services.insert(NAME, Arc::new(service("http://127.0.0.1:9/comments").await));

        let definition =
            ApiDefinition::synthesize(&services, &MiddlewareRegistry::with_standard()).unwrap();
        let json = definition.document_json();

        assert_eq!(definition.routes().len(), 2);
        assert_eq!(json["paths"]["/data"]["post"]["requestBody"]["required"], true);
        assert_eq!(
            json["paths"]["/data"]["get"]["parameters"][0]["name"],
            "page"
        );
        assert_eq!(
            json["paths"]["/data"]["post"]["security"][0]["openIdConnect"][0],
            "create:data"
        );
        assert!(json["components"]["schemas"]["GenericError"].is_object());
    }

    #[tokio::test]
    async fn fetch_reads_requested_page() {
        let service = service("http://127.0.0.1:9/comments").await;
        for id in 1..=35 {
            service
                .store
                .try_insert_row(&DataRow::new(id, 1, "name", "a@b.c", "body"))
                .await
                .unwrap();
        }

        let request = RequestHelper::new(Method::GET, "/data", "/data")
            .with_query([("page".to_string(), "2".to_string())].into());
        let mut response = ResponseHelper::new();
        let value = service
            .call(FETCH_INSERT_DATA, &request, &mut response)
            .await
            .unwrap()
            .unwrap();

        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["id"], 31);
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let service = service("http://127.0.0.1:9/comments").await;
        let request = RequestHelper::new(Method::GET, "/data", "/data");
        let mut response = ResponseHelper::new();

        let result = service.call("dropAll", &request, &mut response).await;

        assert!(matches!(result, Err(ServiceError::UnknownMethod { .. })));
    }

    #[test]
    fn no_listening_hook_unless_configured() {
        let service = tokio_test::block_on(service("http://127.0.0.1:9/comments"));
        assert!(service.on_listening().is_none());
    }
}
