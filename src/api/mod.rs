use axum::{
    Router,
    extract::{Form, FromRequest, Json, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::client::{AnalyzeResponse, ClientError, HttpAnalysisClient};
use crate::core::PlanPolicy;
use crate::form::{FormHandler, FormSubmission};

const INDEX_HTML: &str = include_str!("../../web/index.html");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub backend_url: Option<String>,
    pub timeout: Option<Duration>,
    pub policy: PlanPolicy,
}

#[derive(Clone)]
struct AppState {
    handler: Arc<FormHandler>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

/// Server-side handler: never prompts, proxies upstream when a backend is configured.
pub fn build_handler(config: &ServerConfig) -> Result<FormHandler, ClientError> {
    let handler = FormHandler::new(config.policy);
    let Some(url) = config.backend_url.as_deref() else {
        return Ok(handler);
    };
    let client = HttpAnalysisClient::new(url, config.timeout)?;
    info!(endpoint = client.endpoint(), "forwarding analysis to upstream backend");
    Ok(handler.with_client(Arc::new(client)))
}

pub fn router(handler: FormHandler) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/health", get(health_handler))
        .route(
            "/analyze",
            get(analyze_get_handler).post(analyze_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(AppState {
            handler: Arc::new(handler),
        })
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let handler = build_handler(&config).map_err(std::io::Error::other)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "finplan HTTP API listening");
    info!("Local access: http://127.0.0.1:{}/", config.port);

    axum::serve(listener, router(handler)).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            service: "finplan",
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn analyze_get_handler(
    State(state): State<AppState>,
    Query(form): Query<FormSubmission>,
) -> Response {
    analyze_handler_impl(&state, form).await
}

async fn analyze_post_handler(State(state): State<AppState>, request: Request) -> Response {
    match submission_from_request(request, &state).await {
        Ok(form) => analyze_handler_impl(&state, form).await,
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn analyze_handler_impl(state: &AppState, form: FormSubmission) -> Response {
    debug!(?form, "analysis requested");
    let outcome = state.handler.submit(&form).await;
    json_response(StatusCode::OK, outcome.into_response())
}

/// JSON bodies go through `Json`, everything else is read as a urlencoded form.
async fn submission_from_request(
    request: Request,
    state: &AppState,
) -> Result<FormSubmission, String> {
    if is_json_request(&request) {
        Json::<FormSubmission>::from_request(request, state)
            .await
            .map(|Json(form)| form)
            .map_err(|rejection| format!("Invalid JSON payload: {}", rejection.body_text()))
    } else {
        Form::<FormSubmission>::from_request(request, state)
            .await
            .map(|Form(form)| form)
            .map_err(|rejection| format!("Invalid form payload: {}", rejection.body_text()))
    }
}

fn is_json_request(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| {
            let mime = content_type.split(';').next().unwrap_or("").trim();
            mime == "application/json" || mime.ends_with("+json")
        })
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(status, AnalyzeResponse::failure(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{ExpensesField, FieldValue};
    use axum::body::{Body, to_bytes};
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(FormHandler::new(PlanPolicy::default()))
    }

    async fn send(request: HttpRequest<Body>) -> (StatusCode, Response) {
        let response = test_router()
            .oneshot(request)
            .await
            .expect("router is infallible");
        (response.status(), response)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    fn post(content_type: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/analyze")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request")
    }

    #[test]
    fn submission_from_json_accepts_mapping_and_camel_case_risk() {
        let json = r#"{
          "income": 50000,
          "expenses": {"rent": 15000, "food": "5000", "junk": "abc"},
          "riskLevel": "High",
          "debt": "1200"
        }"#;
        let form: FormSubmission = serde_json::from_str(json).expect("json should parse");
        assert_eq!(form.income, Some(FieldValue::Number(50_000.0)));
        assert!(matches!(form.expenses, Some(ExpensesField::Map(_))));

        let input = form.to_input();
        assert_eq!(input.total_expenses(), 20_000.0);
        assert_eq!(input.debt, 1_200.0);
        assert_eq!(input.risk_level, crate::core::RiskLevel::High);
    }

    #[test]
    fn submission_from_json_accepts_delimited_expenses() {
        let json = r#"{"income": "3000", "expenses": "rent:1000, food:abc, transport:300"}"#;
        let form: FormSubmission = serde_json::from_str(json).expect("json should parse");
        assert_eq!(form.to_input().total_expenses(), 1_300.0);
    }

    #[tokio::test]
    async fn post_json_returns_fallback_plan() {
        let (status, response) = send(post(
            "application/json",
            r#"{"income": 50000, "expenses": "rent:15000,groceries:5000,dining:10000", "risk_level": "medium"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["source"], "fallback");
        assert!(json.get("fallback_reason").is_none());
        assert_eq!(json["results"]["financial_health_score"], 72.0);
        assert_eq!(json["results"]["debt_plan"]["status"], "debt free");
    }

    #[tokio::test]
    async fn post_form_encoded_is_accepted() {
        let (status, response) = send(post(
            "application/x-www-form-urlencoded",
            "income=3000&expenses=rent%3A1000%2Cfood%3Aabc%2Ctransport%3A300&risk_level=low&debt=600",
        ))
        .await;
        assert_eq!(status, StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        let portfolio = json["results"]["investment_plan"]["portfolio"]
            .as_array()
            .expect("portfolio array");
        assert_eq!(portfolio.len(), 4);
        assert_eq!(portfolio[0]["amount"], 5_200.0);
        assert_eq!(json["results"]["debt_plan"]["status"], "manageable");
        assert_eq!(json["results"]["debt_plan"]["estimated_months_to_clear"], 2);
    }

    #[tokio::test]
    async fn get_query_is_accepted() {
        let (status, response) = send(get_request(
            "/analyze?income=0&expenses=rent%3A500&debt=100",
        ))
        .await;
        assert_eq!(status, StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["results"]["budget_plan"]["current_allocation"]["savings_percentage"], 0.0);
        assert_eq!(json["results"]["debt_plan"]["status"], "needs attention");
    }

    #[tokio::test]
    async fn null_and_boolean_amounts_are_read_as_zero() {
        let (status, response) = send(post(
            "application/json",
            r#"{"income": 5000, "expenses": {"rent": 1000, "food": null}}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["results"]["budget_plan"]["current_allocation"]["needs_percentage"], 20.0);

        let (status, response) = send(post(
            "application/json",
            r#"{"income": true, "expenses": "rent:1000", "debt": null}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["results"]["budget_plan"]["current_allocation"]["savings_percentage"], 0.0);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, response) = send(post("application/json", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(
            json["error"]
                .as_str()
                .expect("error message")
                .starts_with("Invalid JSON payload")
        );
        assert!(json.get("results").is_none());
    }

    #[tokio::test]
    async fn response_carries_every_field_the_renderer_reads() {
        let (_, response) = send(post(
            "application/json",
            r#"{"income": 42000, "expenses": {"rent": 12000, "travel": 3000}, "debt": 8000}"#,
        ))
        .await;
        let json = body_json(response).await;

        for pointer in [
            "/results/budget_plan/current_allocation/needs_percentage",
            "/results/budget_plan/current_allocation/wants_percentage",
            "/results/budget_plan/current_allocation/savings_percentage",
            "/results/budget_plan/recommended_allocation_50_30_20/needs_percentage",
            "/results/budget_plan/recommended_monthly_savings",
            "/results/budget_plan/tips/0",
            "/results/investment_plan/portfolio/0/asset",
            "/results/investment_plan/portfolio/0/allocation_percent",
            "/results/investment_plan/portfolio/0/amount",
            "/results/investment_plan/portfolio/0/note",
            "/results/investment_plan/important_considerations/0",
            "/results/expense_optimizations/0/action",
            "/results/expense_optimizations/0/estimated_savings",
            "/results/expense_optimizations/0/reason",
            "/results/debt_plan/status",
            "/results/debt_plan/estimated_months_to_clear",
            "/results/debt_plan/recommended_strategy",
            "/results/financial_health_score",
        ] {
            let value = json.pointer(pointer);
            assert!(
                value.is_some_and(|v| !v.is_null()),
                "missing field {pointer} in {json}"
            );
        }
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (status, response) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "finplan");
    }

    #[tokio::test]
    async fn index_serves_form() {
        let (status, response) = send(get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let html = String::from_utf8(bytes.to_vec()).expect("utf-8 html");
        assert!(html.contains("action=\"/analyze\""));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (status, response) = send(get_request("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Not found");
    }

    #[test]
    fn build_handler_without_backend_is_local_only() {
        let config = ServerConfig {
            port: 0,
            backend_url: None,
            timeout: None,
            policy: PlanPolicy::default(),
        };
        assert!(build_handler(&config).is_ok());
    }
}
