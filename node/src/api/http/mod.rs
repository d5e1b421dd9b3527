use actix_web::{dev::Server, http::KeepAlive, web::Data, App, HttpServer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::PiChainExternalApi;
use crate::config::Configuration;

pub mod client;
pub(crate) mod query;
pub(crate) mod submit;

/// Starts the HTTP server.
pub(crate) fn init(config: &Configuration, api: PiChainExternalApi) -> anyhow::Result<Server> {
    print_startup_messages(config);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(api.clone()))
            .service(query::health)
            .service(query::status)
            .service(query::committed)
            .service(query::block_by_id)
            .service(submit::submit_command)
            .service(swagger_ui())
    })
    .keep_alive(KeepAlive::Os)
    .bind((config.node.ip.as_str(), config.http.port))?
    .run();
    Ok(server)
}

/// Builds the Swagger UI.
///
/// Note that all routes you want Swagger docs for must be in the `paths` annotation.
fn swagger_ui() -> SwaggerUi {
    use crate::api::types;
    #[derive(OpenApi)]
    #[openapi(
        paths(
            query::health,
            query::status,
            query::committed,
            query::block_by_id,
            submit::submit_command,
        ),
        components(schemas(
            types::ApiBlock,
            types::ApiTransaction,
            types::ApiNodeStatus,
            types::ApiCommitted,
            types::ApiSubmitRequest,
            types::ApiSubmitResponse,
            types::Health,
        ))
    )]
    struct ApiDoc;
    SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi())
}

/// Prints messages saying which port HTTP is running on, and some helpful pointers
/// to the Swagger UI and OpenAPI spec.
fn print_startup_messages(config: &Configuration) {
    let http_root = config.http_address();
    log::info!("Server running on {}", http_root);
    log::info!("Swagger UI: {}/swagger-ui/", http_root);
    log::info!("OpenAPI spec is at: {}/api-doc/openapi.json", http_root);
}
