//! HTTP Server
//!
//! REST routes over the ledger, with CORS open for browser clients.

use crate::methods::{
    handle_create_wallet, handle_founder_onboarding, handle_get_balance, handle_get_health,
    handle_get_ledger, handle_get_node, handle_get_transactions, handle_standard_onboarding,
    handle_submit_transaction, handle_verify, RpcContext, RpcError, TransactionRequest,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// HTTP Server
pub struct HttpRpcServer {
    context: Arc<RpcContext>,
}

impl HttpRpcServer {
    /// Create a new HTTP server
    pub fn new(context: Arc<RpcContext>) -> Self {
        Self { context }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // CORS layer to allow browser clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/ledger", get(get_ledger))
            .route("/verify", get(verify))
            .route("/node/:level/:index", get(get_node))
            .route("/transaction", post(submit_transaction))
            .route("/transactions/:wallet", get(get_transactions))
            .route("/balance/:wallet", get(get_balance))
            .route("/founder-onboarding", post(founder_onboarding))
            .route("/standard-onboarding", post(standard_onboarding))
            .route("/wallet", post(create_wallet))
            .route("/health", get(health))
            .layer(cors)
            .with_state(self.context)
    }

    /// Run the server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server listening on {}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        (status_code(&self), Json(self.body())).into_response()
    }
}

/// Map error to HTTP status
fn status_code(error: &RpcError) -> StatusCode {
    match error {
        RpcError::InvalidParams(_) => StatusCode::BAD_REQUEST,
        RpcError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RpcError::Precondition(_) => StatusCode::CONFLICT,
        RpcError::NotFound(_) => StatusCode::NOT_FOUND,
        RpcError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: Result<T, RpcError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_ledger(State(ctx): State<Arc<RpcContext>>) -> Response {
    ctx.log_call("getLedger");
    respond(handle_get_ledger(&ctx))
}

async fn verify(State(ctx): State<Arc<RpcContext>>) -> Response {
    ctx.log_call("verify");
    respond(handle_verify(&ctx))
}

async fn get_node(
    State(ctx): State<Arc<RpcContext>>,
    Path((level, index)): Path<(u32, u64)>,
) -> Response {
    ctx.log_call("getNode");
    respond(handle_get_node(&ctx, level, index))
}

async fn submit_transaction(
    State(ctx): State<Arc<RpcContext>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Response {
    ctx.log_call("submitTransaction");
    let result = payload
        .map_err(|e| RpcError::InvalidParams(e.body_text()))
        .and_then(|Json(request)| handle_submit_transaction(&ctx, request));
    respond(result)
}

async fn get_transactions(
    State(ctx): State<Arc<RpcContext>>,
    Path(wallet): Path<String>,
) -> Response {
    ctx.log_call("getTransactions");
    respond(handle_get_transactions(&ctx, &wallet))
}

async fn get_balance(State(ctx): State<Arc<RpcContext>>, Path(wallet): Path<String>) -> Response {
    ctx.log_call("getBalance");
    respond(handle_get_balance(&ctx, &wallet))
}

async fn founder_onboarding(State(ctx): State<Arc<RpcContext>>) -> Response {
    ctx.log_call("founderOnboarding");
    respond(handle_founder_onboarding(&ctx))
}

async fn standard_onboarding(State(ctx): State<Arc<RpcContext>>) -> Response {
    ctx.log_call("standardOnboarding");
    respond(handle_standard_onboarding(&ctx))
}

async fn create_wallet(State(ctx): State<Arc<RpcContext>>) -> Response {
    ctx.log_call("createWallet");
    respond(handle_create_wallet(&ctx))
}

async fn health() -> Response {
    respond(handle_get_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ledger_runtime::{Ledger, LedgerConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> (Router, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::new(LedgerConfig::default()).unwrap());
        let context = Arc::new(RpcContext::new(Arc::clone(&ledger)));
        (HttpRpcServer::new(context).router(), ledger)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router();
        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("ok"));
    }

    #[tokio::test]
    async fn test_onboarding_and_transfer_flow() {
        let (router, _) = router();

        let (status, founder) = call(&router, "POST", "/founder-onboarding", None).await;
        assert_eq!(status, StatusCode::OK);
        let f = founder["foundational_wallet"].as_str().unwrap().to_string();

        let (status, standard) = call(&router, "POST", "/standard-onboarding", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(standard["initial_balance"], json!(10.0));
        let w1 = standard["wallet"].as_str().unwrap().to_string();

        let (status, accepted) = call(
            &router,
            "POST",
            "/transaction",
            Some(json!({ "sender": f, "receiver": w1, "amount": 5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], json!("accepted"));
        assert_eq!(accepted["transaction"]["amount"], json!(5.0));

        let (_, balance) = call(&router, "GET", &format!("/balance/{}", f), None).await;
        assert_eq!(balance["balance"], json!(95.0));
        let (_, balance) = call(&router, "GET", &format!("/balance/{}", w1), None).await;
        assert_eq!(balance["balance"], json!(15.0));

        let (_, history) = call(&router, "GET", &format!("/transactions/{}", w1), None).await;
        assert_eq!(history["transactions"].as_array().unwrap().len(), 2);

        let (status, report) = call(&router, "GET", "/verify", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["valid"], json!(true));

        let (_, tree) = call(&router, "GET", "/ledger", None).await;
        assert_eq!(tree["level"], json!(0));
        assert_eq!(tree["children"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_transaction_carries_detail() {
        let (router, ledger) = router();
        let f = ledger.founder_onboarding().unwrap().foundational_wallet;
        let w1 = ledger.standard_onboarding().unwrap().wallet;
        let root_before = ledger.root_hash();

        let (status, body) = call(
            &router,
            "POST",
            "/transaction",
            Some(json!({ "sender": f, "receiver": w1, "amount": -5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], json!("rejected"));
        assert_eq!(body["kind"], json!("validation_failed"));
        assert!(!body["detail"].as_str().unwrap().is_empty());
        assert_eq!(ledger.root_hash(), root_before);
    }

    #[tokio::test]
    async fn test_precondition_errors_are_conflicts() {
        let (router, _) = router();

        let (status, body) = call(
            &router,
            "POST",
            "/transaction",
            Some(json!({ "sender": "a", "receiver": "b", "amount": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], json!("precondition_failed"));

        let (status, _) = call(&router, "POST", "/standard-onboarding", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        call(&router, "POST", "/founder-onboarding", None).await;
        let (status, body) = call(&router, "POST", "/founder-onboarding", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (router, _) = router();
        let (status, body) = call(
            &router,
            "POST",
            "/transaction",
            Some(json!({ "sender": "a", "amount": "lots" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("invalid_params"));
    }

    #[tokio::test]
    async fn test_unknown_wallet_and_node() {
        let (router, _) = router();

        let (status, body) = call(&router, "GET", "/balance/nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], json!(0.0));

        let (status, body) = call(&router, "GET", "/transactions/nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"], json!([]));

        let (status, _) = call(&router, "GET", "/node/4/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, node) = call(&router, "GET", "/node/0/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node["index"], json!(0));
    }
}
