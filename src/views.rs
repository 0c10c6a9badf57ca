use actix_web::{error::InternalError, http::StatusCode, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;
use crate::paging::PageQuery;
use crate::schemas::InferenceServiceInfo;
use crate::service::ServingContext;

pub const MODULE_CODE: u32 = 102;
pub const SUCCESS_MESSAGE: &str = "API response success";

/// Envelope of every API answer: the module code followed by the HTTP status, e.g. `102200`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub code: u32,
    pub message: String,
    pub result: Value,
}

fn envelope_code(status: StatusCode) -> u32 {
    MODULE_CODE * 1000 + u32::from(status.as_u16())
}

impl ApiResponse {
    pub fn success<T: Serialize>(status: StatusCode, result: T) -> Result<Self, Error> {
        Ok(ApiResponse {
            code: envelope_code(status),
            message: SUCCESS_MESSAGE.to_owned(),
            result: serde_json::to_value(result)?,
        })
    }

    pub fn failure(status: StatusCode, err: &Error) -> Self {
        ApiResponse {
            code: envelope_code(status),
            message: err.kind().to_owned(),
            result: Value::String(err.to_string()),
        }
    }
}

fn respond<T: Serialize>(status: StatusCode, result: T) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::build(status).json(ApiResponse::success(status, result)?))
}

#[derive(Deserialize, Debug, Clone)]
pub struct InferRequest {
    pub data: Value,
    #[serde(default)]
    pub multi: bool,
}

// Simple health check endpoint
pub async fn health(_req: HttpRequest) -> HttpResponse {
    HttpResponse::new(StatusCode::OK)
}

// JSON schema of the create/patch/replace document
pub async fn schema() -> HttpResponse {
    HttpResponse::Ok().json(schemars::schema_for!(InferenceServiceInfo))
}

pub async fn create_inference_service(
    data: web::Data<ServingContext>,
    info: web::Json<InferenceServiceInfo>,
) -> Result<HttpResponse, Error> {
    let created = data.create(&info).await?;
    respond(StatusCode::CREATED, created)
}

pub async fn patch_inference_service(
    data: web::Data<ServingContext>,
    info: web::Json<InferenceServiceInfo>,
) -> Result<HttpResponse, Error> {
    let patched = data.patch(&info).await?;
    respond(StatusCode::OK, patched)
}

pub async fn replace_inference_service(
    data: web::Data<ServingContext>,
    info: web::Json<InferenceServiceInfo>,
) -> Result<HttpResponse, Error> {
    let replaced = data.replace(&info).await?;
    respond(StatusCode::OK, replaced)
}

pub async fn get_inference_service(
    data: web::Data<ServingContext>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, Error> {
    let (namespace, name) = path.into_inner();
    let status = data.get(&name, &namespace).await?;
    respond(StatusCode::OK, status)
}

pub async fn delete_inference_service(
    data: web::Data<ServingContext>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, Error> {
    let (namespace, name) = path.into_inner();
    data.delete(&name, &namespace).await?;
    respond(StatusCode::OK, Value::Null)
}

pub async fn list_inference_services(
    data: web::Data<ServingContext>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let page = data.list(&path.into_inner(), &query).await?;
    respond(StatusCode::OK, page)
}

pub async fn infer(
    data: web::Data<ServingContext>,
    path: web::Path<(String, String)>,
    request: web::Json<InferRequest>,
) -> Result<HttpResponse, Error> {
    let (namespace, name) = path.into_inner();
    let predictions = data.infer(&name, &namespace, &request.data, request.multi).await?;
    respond(StatusCode::OK, predictions)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let status = StatusCode::BAD_REQUEST;
        let body = ApiResponse {
            code: envelope_code(status),
            message: "invalid_request".to_owned(),
            result: Value::String(err.to_string()),
        };
        InternalError::from_response(err, HttpResponse::build(status).json(body)).into()
    })
}

/// Register every route; shared by `main` and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/health").to(health))
        .service(web::resource("/kserve/schema").route(web::get().to(schema)))
        .service(
            web::resource("/kserve")
                .route(web::post().to(create_inference_service))
                .route(web::patch().to(patch_inference_service))
                .route(web::put().to(replace_inference_service)),
        )
        .service(web::resource("/kserve/{namespace}").route(web::get().to(list_inference_services)))
        .service(
            web::resource("/kserve/{namespace}/{name}")
                .route(web::get().to(get_inference_service))
                .route(web::delete().to(delete_inference_service)),
        )
        .service(web::resource("/kserve/{namespace}/{name}/infer").route(web::post().to(infer)));
}
