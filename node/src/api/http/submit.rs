use actix_web::{post, web, HttpResponse};

use crate::api::types::{ApiSubmitRequest, ApiSubmitResponse};
use crate::api::{ApiError, PiChainExternalApi};

#[utoipa::path(
request_body = ApiSubmitRequest,
responses(
(status = 200, description = "Submit a command which is committed by the cluster", body = ApiSubmitResponse),
(status = 400, description = "Command rejected by the application"),
(status = 500, description = "Server failed to process request")),
)]
#[post("/pichain/submit")]
pub(crate) async fn submit_command(
    request: web::Json<ApiSubmitRequest>,
    api: web::Data<PiChainExternalApi>,
) -> HttpResponse {
    let request = request.into_inner();
    log::debug!("POST /pichain/submit {} bytes", request.command.len());

    match api.submit(request.command).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(ApiError::Rejected) => {
            log::debug!("Command rejected by the application");
            HttpResponse::BadRequest().json("Command rejected")
        }
        Err(err) => {
            log::error!("Error submitting command: {}", err);
            HttpResponse::InternalServerError().json("Server failed to process request")
        }
    }
}
