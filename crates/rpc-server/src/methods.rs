//! RPC Methods - ledger request handlers
//!
//! Plain functions over an `RpcContext`; `http_server` wires them to routes.

use ledger_runtime::{
    Amount, LedgerError, Ledger, NodeCoord, NodeSnapshot, PreconditionError, Transaction,
    ValidationError, VerifyReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// RPC context shared across handlers
pub struct RpcContext {
    pub ledger: Arc<Ledger>,
    pub verbose: bool,
}

impl RpcContext {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            verbose: false,
        }
    }

    pub(crate) fn log_call(&self, method: &str) {
        if self.verbose {
            tracing::info!("RPC method called: {}", method);
        } else {
            tracing::debug!("RPC method called: {}", method);
        }
    }
}

// ============ Request/Response Types ============

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender: String,
    pub receiver: String,
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionAccepted {
    pub status: String,
    pub transaction: Transaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FounderOnboardingResponse {
    pub foundational_wallet: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandardOnboardingResponse {
    pub wallet: String,
    pub initial_balance: Amount,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWalletResponse {
    pub wallet: String,
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub kind: String,
    pub detail: String,
}

// ============ RPC Handlers ============

/// Handle GET /ledger
pub fn handle_get_ledger(ctx: &RpcContext) -> Result<NodeSnapshot, RpcError> {
    Ok(ctx.ledger.tree_snapshot())
}

/// Handle GET /verify
pub fn handle_verify(ctx: &RpcContext) -> Result<VerifyReport, RpcError> {
    Ok(ctx.ledger.verify())
}

/// Handle GET /node/{level}/{index}
pub fn handle_get_node(ctx: &RpcContext, level: u32, index: u64) -> Result<NodeSnapshot, RpcError> {
    let coord = NodeCoord::new(level, index);
    ctx.ledger
        .node(coord)
        .ok_or_else(|| RpcError::NotFound(format!("node {}", coord)))
}

/// Handle POST /transaction: sign with the custodial key and submit
pub fn handle_submit_transaction(
    ctx: &RpcContext,
    request: TransactionRequest,
) -> Result<TransactionAccepted, RpcError> {
    let transaction = ctx
        .ledger
        .transfer(&request.sender, &request.receiver, request.amount)
        .map_err(|e| {
            tracing::warn!(
                "Rejected transfer {} -> {} {}: {}",
                request.sender,
                request.receiver,
                request.amount,
                e
            );
            RpcError::from(e)
        })?;

    Ok(TransactionAccepted {
        status: "accepted".to_string(),
        transaction,
    })
}

/// Handle GET /transactions/{wallet}
pub fn handle_get_transactions(ctx: &RpcContext, wallet: &str) -> Result<TransactionsResponse, RpcError> {
    let transactions = ctx
        .ledger
        .transactions_for(wallet)
        .iter()
        .map(|tx| (**tx).clone())
        .collect();
    Ok(TransactionsResponse { transactions })
}

/// Handle GET /balance/{wallet}
pub fn handle_get_balance(ctx: &RpcContext, wallet: &str) -> Result<BalanceResponse, RpcError> {
    Ok(BalanceResponse {
        balance: ctx.ledger.balance_for(wallet),
    })
}

/// Handle POST /founder-onboarding
pub fn handle_founder_onboarding(ctx: &RpcContext) -> Result<FounderOnboardingResponse, RpcError> {
    let onboarded = ctx.ledger.founder_onboarding()?;
    Ok(FounderOnboardingResponse {
        message: format!(
            "Founder onboarding complete with {} units",
            onboarded.initial_balance
        ),
        foundational_wallet: onboarded.foundational_wallet,
    })
}

/// Handle POST /standard-onboarding
pub fn handle_standard_onboarding(ctx: &RpcContext) -> Result<StandardOnboardingResponse, RpcError> {
    let onboarded = ctx.ledger.standard_onboarding()?;
    Ok(StandardOnboardingResponse {
        message: format!("Wallet {} onboarded", onboarded.wallet),
        wallet: onboarded.wallet,
        initial_balance: onboarded.initial_balance,
    })
}

/// Handle POST /wallet
pub fn handle_create_wallet(ctx: &RpcContext) -> Result<CreateWalletResponse, RpcError> {
    Ok(CreateWalletResponse {
        wallet: ctx.ledger.create_wallet(),
    })
}

/// Handle GET /health
pub fn handle_get_health() -> Result<String, RpcError> {
    Ok("ok".to_string())
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Rejected(ValidationError),
    #[error("{0}")]
    Precondition(PreconditionError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RpcError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::InvalidParams(_) => "invalid_params",
            RpcError::Rejected(_) => "validation_failed",
            RpcError::Precondition(_) => "precondition_failed",
            RpcError::NotFound(_) => "not_found",
            RpcError::InternalError(_) => "internal_error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: "rejected".to_string(),
            kind: self.kind().to_string(),
            detail: self.to_string(),
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Validation(e) => RpcError::Rejected(e),
            LedgerError::Precondition(e) => RpcError::Precondition(e),
            other => RpcError::InternalError(other.to_string()),
        }
    }
}
