#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::endpoint::BoxEndpoint;
use poem::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use poem::middleware::SetHeader;
use poem::{EndpointExt, Route};
use poem_openapi::OpenApiService;

use crate::utils::fun_facts::FactProvider;

use classify_number::ClassifyNumberApi;
use version::{VersionApi, BUILD_INFO};

pub mod classify_number;
pub mod version;

// ---------------------------------------------------------------------------
// build_routes:
// ---------------------------------------------------------------------------
/** Assemble the full route tree: the endpoints under /api, the generated
 * openapi documents and the swagger ui.  Every response allows any origin.
 * The workers value caps concurrent classifications.
 */
pub fn build_routes(facts: Arc<dyn FactProvider>, workers: usize, server_url: &str, title: &str)
-> BoxEndpoint<'static> {
    // Create a tuple with all the endpoint structs.
    let endpoints = (ClassifyNumberApi::new(facts, workers), VersionApi);
    let api_service =
        OpenApiService::new(endpoints, title, BUILD_INFO.version).server(server_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/api", api_service)
        .nest("/", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .with(SetHeader::new().overriding(ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .map_to_response()
        .boxed()
}
