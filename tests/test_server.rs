use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};

use kserve_controller::crd::inference_service::{Condition, InferenceServiceStatus};
use kserve_controller::errors::Error;
use kserve_controller::inference::UNKNOWN_PROTOCOL;
use kserve_controller::metrics::INFERENCE_REQUESTS;
use kserve_controller::schemas::{InferenceServiceInfo, ProtocolVersion};
use kserve_controller::views::{self, ApiResponse, SUCCESS_MESSAGE};
use kserve_controller::ServingContext;

mod helpers;

use helpers::{FakePlatform, FakeRegistry};

const SERVICE_HOST: &str = "iris-model.team-a.example.com";

fn iris_info() -> InferenceServiceInfo {
    serde_json::from_value(helpers::example_config("iris-model.yaml")).expect("fixture is a valid request")
}

fn ready_status() -> InferenceServiceStatus {
    InferenceServiceStatus {
        url: Some(format!("http://{}", SERVICE_HOST)),
        conditions: vec![Condition {
            type_: "Ready".to_owned(),
            status: "True".to_owned(),
            ..Condition::default()
        }],
        ..InferenceServiceStatus::default()
    }
}

// Answers like a model server behind the ingress, but only for the routed Host
async fn stand_in_model(req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    let host = req.headers().get("host").and_then(|host| host.to_str().ok());
    if host != Some(SERVICE_HOST) {
        return HttpResponse::NotFound().finish();
    }
    match req.path() {
        "/v1/models/iris-model:predict" if body.get("instances").is_some() => {
            HttpResponse::Ok().json(json!({"predictions": [1]}))
        }
        "/v2/models/iris-model/infer" if body.get("inputs").is_some() => HttpResponse::Ok().json(json!({
            "model_name": "iris-model",
            "outputs": [{"name": "output-1", "shape": [1], "datatype": "INT64", "data": [7]}]
        })),
        "/v2/models/crashing/infer" => HttpResponse::InternalServerError().body("model crashed"),
        "/v2/models/odd-shape/infer" => HttpResponse::Ok().json(json!({"result": 1})),
        _ => HttpResponse::BadRequest().finish(),
    }
}

fn start_stand_in() -> SocketAddr {
    let server = HttpServer::new(|| App::new().default_service(web::to(stand_in_model)))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind stand-in model server");
    let address = server.addrs()[0];
    actix_rt::spawn(server.run());
    address
}

fn context(platform: Arc<FakePlatform>, ingress_host: &str) -> web::Data<ServingContext> {
    let registry = Arc::new(FakeRegistry::with_sources(&["s3://a/1", "s3://a/2"]));
    web::Data::new(helpers::context(platform, registry, ingress_host))
}

#[actix_rt::test]
async fn test_view_health() {
    let req = test::TestRequest::default().to_http_request();
    let resp = views::health(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_schema_describes_request_document() {
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform, "http://127.0.0.1:1"))
            .configure(views::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/kserve/schema").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let schema: Value = test::read_body_json(resp).await;
    assert_eq!(schema["title"], "InferenceServiceInfo");
}

#[actix_rt::test]
async fn test_create_get_delete_round() {
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform.clone(), "http://127.0.0.1:1"))
            .configure(views::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/kserve").set_json(&iris_info()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.code, 102201);
    assert_eq!(body.message, SUCCESS_MESSAGE);
    assert_eq!(body.result["spec"]["predictor"]["model"]["storageUri"], "s3://a/2");

    platform.set_status("iris-model", "team-a", ready_status());
    let req = test::TestRequest::get().uri("/kserve/team-a/iris-model").to_request();
    let body: ApiResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.result["ready"], "True");
    assert_eq!(body.result["url"], format!("http://{}", SERVICE_HOST));

    let req = test::TestRequest::delete().uri("/kserve/team-a/iris-model").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/kserve/team-a/iris-model").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.code, 102404);
    assert_eq!(body.message, "not_found");
}

#[actix_rt::test]
async fn test_invalid_create_is_rejected_before_platform() {
    let platform = Arc::new(FakePlatform::default());
    let registry = Arc::new(FakeRegistry::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(helpers::context(platform.clone(), registry, "http://127.0.0.1:1")))
            .configure(views::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/kserve").set_json(&iris_info()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, "invalid_spec");
    assert_eq!(platform.writes(), 0);

    let req = test::TestRequest::post()
        .uri("/kserve")
        .set_json(&json!({"name": "no-spec"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, "invalid_request");
}

#[actix_rt::test]
async fn test_infer_without_url_is_not_ready() {
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform, "http://127.0.0.1:1"))
            .configure(views::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/kserve").set_json(&iris_info()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/kserve/team-a/iris-model/infer")
        .set_json(&json!({"data": [[5.1, 3.5, 1.4, 0.2]]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, "service_not_ready");
}

#[actix_rt::test]
async fn test_infer_empty_payload_is_invalid_input() {
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform, "http://127.0.0.1:1"))
            .configure(views::configure),
    )
    .await;

    let rejected = INFERENCE_REQUESTS.with_label_values(&[UNKNOWN_PROTOCOL, "invalid_input"]);
    let before = rejected.get();

    // Rejected before the service is even looked up
    let req = test::TestRequest::post()
        .uri("/kserve/team-a/unknown/infer")
        .set_json(&json!({"data": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, "invalid_input");
    assert!(rejected.get() > before);
}

#[actix_rt::test]
async fn test_infer_unknown_service_is_counted() {
    let platform = Arc::new(FakePlatform::default());
    let ctx = context(platform, "http://127.0.0.1:1");
    let missing = INFERENCE_REQUESTS.with_label_values(&[UNKNOWN_PROTOCOL, "not_found"]);
    let before = missing.get();

    let result = ctx.infer("unknown", "team-a", &json!([[1.0]]), false).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(missing.get() > before);
}

#[actix_rt::test]
async fn test_failing_model_answers_are_transport_errors() {
    let address = start_stand_in();
    let platform = Arc::new(FakePlatform::default());
    let ctx = context(platform.clone(), &format!("http://{}", address));
    for name in &["crashing", "odd-shape"] {
        let mut info = iris_info();
        info.name = name.to_string();
        ctx.create(&info).await.unwrap();
        platform.set_status(name, "team-a", ready_status());
    }
    let payload = json!([[5.1, 3.5, 1.4, 0.2]]);

    match ctx.infer("crashing", "team-a", &payload, false).await {
        Err(Error::InferenceTransport { status, body }) => {
            assert_eq!(status, Some(500));
            assert_eq!(body, "model crashed");
        }
        other => panic!("Expected a transport error, got {:?}", other),
    }

    match ctx.infer("odd-shape", "team-a", &payload, false).await {
        Err(Error::InferenceTransport { status, body }) => {
            assert_eq!(status, Some(200));
            assert!(body.contains("result"));
        }
        other => panic!("Expected a transport error, got {:?}", other),
    }

    let app = test::init_service(App::new().app_data(ctx.clone()).configure(views::configure)).await;
    let req = test::TestRequest::post()
        .uri("/kserve/team-a/crashing/infer")
        .set_json(&json!({"data": [[5.1, 3.5, 1.4, 0.2]]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.message, "inference_transport");
}

#[actix_rt::test]
async fn test_infer_v2_through_ingress() {
    let address = start_stand_in();
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform.clone(), &format!("http://{}", address)))
            .configure(views::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/kserve").set_json(&iris_info()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    platform.set_status("iris-model", "team-a", ready_status());

    let req = test::TestRequest::post()
        .uri("/kserve/team-a/iris-model/infer")
        .set_json(&json!({"data": [[5.1, 3.5, 1.4, 0.2]]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.result, json!([7]));
}

#[actix_rt::test]
async fn test_infer_v1_through_ingress() {
    let address = start_stand_in();
    let platform = Arc::new(FakePlatform::default());
    let app = test::init_service(
        App::new()
            .app_data(context(platform.clone(), &format!("http://{}", address)))
            .configure(views::configure),
    )
    .await;

    let mut info = iris_info();
    let model_spec = &mut info.inference_service_spec.predictor.model_spec;
    model_spec.protocol_version = Some(ProtocolVersion::V1);
    model_spec.storage_uri = Some("gs://kfserving-examples/models/sklearn/1.0/model".to_owned());
    let req = test::TestRequest::post().uri("/kserve").set_json(&info).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    platform.set_status("iris-model", "team-a", ready_status());

    let req = test::TestRequest::post()
        .uri("/kserve/team-a/iris-model/infer")
        .set_json(&json!({"data": [[6.8, 2.8, 4.8, 1.4]], "multi": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ApiResponse = test::read_body_json(resp).await;
    assert_eq!(body.result, json!([1]));
}
