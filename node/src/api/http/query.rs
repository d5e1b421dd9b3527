use actix_web::{get, web, HttpResponse, Responder};

use crate::api::types::Health;
use crate::api::{ApiError, PiChainExternalApi};

#[utoipa::path(
responses(
(status = 200, description = "Endpoint to check if the server is running")),
)]
#[get("/pichain/node/health")]
pub(crate) async fn health() -> impl Responder {
    log::debug!("GET /pichain/node/health");
    HttpResponse::Ok().json(Health {
        status: "OK".to_string(),
    })
}

#[utoipa::path(
responses(
(status = 200, description = "Role, head and committed block of the node"),
(status = 500, description = "Server failed to process request")),
)]
#[get("/pichain/node/status")]
pub(crate) async fn status(api: web::Data<PiChainExternalApi>) -> impl Responder {
    log::debug!("GET /pichain/node/status");

    match api.node_status().await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(err) => {
            log::error!("Failed to get node status: {err}");
            HttpResponse::InternalServerError().json("Server failed to process request")
        }
    }
}

#[utoipa::path(
responses(
(status = 200, description = "Committed block ids in commit order"),
(status = 500, description = "Server failed to process request")),
)]
#[get("/pichain/committed")]
pub(crate) async fn committed(api: web::Data<PiChainExternalApi>) -> impl Responder {
    log::debug!("GET /pichain/committed");

    match api.committed_blocks().await {
        Ok(committed) => HttpResponse::Ok().json(committed),
        Err(err) => {
            log::error!("Failed to get committed blocks: {err}");
            HttpResponse::InternalServerError().json("Server failed to process request")
        }
    }
}

#[utoipa::path(
responses(
(status = 200, description = "GET block by id"),
(status = 400, description = "Malformed block id"),
(status = 404, description = "Block not found"),
(status = 500, description = "Server failed to process request")),
params(("id", description = "Block id, `creator-counter` or `genesis`")),
)]
#[get("/pichain/block/{id}")]
pub(crate) async fn block_by_id(
    id: web::Path<String>,
    api: web::Data<PiChainExternalApi>,
) -> impl Responder {
    log::debug!("GET /pichain/block/{id}");

    match api.get_block(id.into_inner()).await {
        Ok(Some(block)) => HttpResponse::Ok().json(block),
        Ok(None) => HttpResponse::NotFound().json("Block not found"),
        Err(ApiError::InvalidBlockId(id)) => {
            HttpResponse::BadRequest().json(format!("Invalid block id: {id}"))
        }
        Err(err) => {
            log::error!("Failed to get block by id: {err}");
            HttpResponse::InternalServerError().json("Server failed to process request")
        }
    }
}
