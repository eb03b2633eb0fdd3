//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::response::SuccessResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mediaduct API",
        version = "0.1.0",
        description = "Asynchronous media ingestion pipeline. Clients register an upload, PUT the original bytes directly to blob storage with a presigned grant, and poll for the processed rendition."
    ),
    paths(handlers::upload::request_upload, handlers::status::get_status),
    components(schemas(
        handlers::upload::UploadRequest,
        handlers::upload::UploadData,
        handlers::status::StatusData,
        SuccessResponse<handlers::upload::UploadData>,
        SuccessResponse<handlers::status::StatusData>,
        error::ErrorResponse,
        error::ErrorBody,
        mediaduct_core::MediaStatus,
    )),
    tags(
        (name = "media", description = "Upload registration and processing status")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
