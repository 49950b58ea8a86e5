//! RPC Server - HTTP interface for the Fractal Ledger
//!
//! Provides the REST surface used by the browser UI:
//! - Ledger tree, integrity check and single-node lookup
//! - Transaction submission, per-wallet history and balances
//! - Founder and standard onboarding, wallet creation

pub mod http_server;
pub mod methods;

pub use http_server::HttpRpcServer;
pub use methods::{RpcContext, RpcError};

use ledger_runtime::Ledger;
use std::sync::Arc;

/// RPC Server configuration
#[derive(Clone, Debug)]
pub struct RpcServerConfig {
    /// HTTP bind address
    pub http_addr: String,
    /// Log every request at info level instead of debug
    pub verbose: bool,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            verbose: false,
        }
    }
}

/// HTTP server bound to one ledger
pub struct RpcServer {
    config: RpcServerConfig,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig) -> Self {
        Self { config }
    }

    /// Serve `ledger` until the listener fails
    pub async fn run(self, ledger: Arc<Ledger>) -> anyhow::Result<()> {
        let context = Arc::new(RpcContext {
            ledger,
            verbose: self.config.verbose,
        });
        HttpRpcServer::new(context).run(&self.config.http_addr).await
    }
}
