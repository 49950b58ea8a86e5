//! One-shot ledger commands
//!
//! Each command loads the persisted ledger, runs, prints its result as JSON
//! and saves again if it changed anything.

use anyhow::Result;
use ledger_runtime::{
    render_tree, Amount, Ledger, LedgerConfig, LedgerPersistence, LedgerSnapshot, PersistentStore,
};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

/// A command that runs against the persisted ledger and exits
#[derive(Debug, Clone)]
pub enum LedgerCommand {
    AddTransaction {
        sender: String,
        receiver: String,
        amount: f64,
    },
    QueryTransactions {
        wallet: String,
    },
    GetBalance {
        wallet: String,
    },
    VerifyLedger,
    VisualizeLedger,
    ExportLedger {
        path: PathBuf,
    },
    ImportLedger {
        path: PathBuf,
    },
    CreateWallet,
    FounderOnboarding,
    StandardOnboarding,
}

impl LedgerCommand {
    fn mutates(&self) -> bool {
        matches!(
            self,
            LedgerCommand::AddTransaction { .. }
                | LedgerCommand::ImportLedger { .. }
                | LedgerCommand::CreateWallet
                | LedgerCommand::FounderOnboarding
                | LedgerCommand::StandardOnboarding
        )
    }
}

/// Open the store under `data_dir` and load whatever it holds
pub fn open_ledger(data_dir: &Path, config: LedgerConfig) -> Result<(Ledger, PersistentStore)> {
    std::fs::create_dir_all(data_dir)?;
    let store = PersistentStore::open(data_dir)?;
    let ledger = Ledger::new(config)?;
    ledger.load_from_disk(&store)?;
    Ok((ledger, store))
}

/// Run `command` and return its printable output
pub fn run(command: LedgerCommand, data_dir: &Path, config: LedgerConfig) -> Result<String> {
    let (ledger, store) = open_ledger(data_dir, config)?;
    let output = execute(&ledger, &command)?;
    if command.mutates() {
        ledger.save_to_disk(&store)?;
    }
    Ok(output)
}

/// Run `command` against an already loaded ledger
pub fn execute(ledger: &Ledger, command: &LedgerCommand) -> Result<String> {
    match command {
        LedgerCommand::AddTransaction {
            sender,
            receiver,
            amount,
        } => {
            let tx = ledger.transfer(sender, receiver, Amount::from(*amount))?;
            pretty(&json!({ "status": "accepted", "transaction": tx }))
        }
        LedgerCommand::QueryTransactions { wallet } => {
            let transactions: Vec<_> = ledger
                .transactions_for(wallet)
                .iter()
                .map(|tx| (**tx).clone())
                .collect();
            pretty(&json!({ "transactions": transactions }))
        }
        LedgerCommand::GetBalance { wallet } => {
            pretty(&json!({ "wallet": wallet, "balance": ledger.balance_for(wallet) }))
        }
        LedgerCommand::VerifyLedger => pretty(&ledger.verify()),
        LedgerCommand::VisualizeLedger => Ok(render_tree(&ledger.tree_snapshot())),
        LedgerCommand::ExportLedger { path } => {
            let snapshot = ledger.export_snapshot();
            std::fs::write(path, snapshot.to_json()?)?;
            tracing::info!("Exported ledger to {:?}", path);
            pretty(&json!({ "exported": path, "root_hash": snapshot.root.hash }))
        }
        LedgerCommand::ImportLedger { path } => {
            let raw = std::fs::read_to_string(path)?;
            ledger.import_snapshot(LedgerSnapshot::from_json(&raw)?)?;
            tracing::info!("Imported ledger from {:?}", path);
            pretty(&ledger.verify())
        }
        LedgerCommand::CreateWallet => pretty(&json!({ "wallet": ledger.create_wallet() })),
        LedgerCommand::FounderOnboarding => {
            let onboarded = ledger.founder_onboarding()?;
            pretty(&onboarded)
        }
        LedgerCommand::StandardOnboarding => {
            let onboarded = ledger.standard_onboarding()?;
            pretty(&onboarded)
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    fn run_json(command: LedgerCommand, dir: &Path) -> Value {
        let output = run(command, dir, LedgerConfig::default()).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_commands_persist_between_runs() {
        let dir = tempdir().unwrap();

        let founder = run_json(LedgerCommand::FounderOnboarding, dir.path());
        let f = founder["foundational_wallet"].as_str().unwrap().to_string();
        let standard = run_json(LedgerCommand::StandardOnboarding, dir.path());
        let w1 = standard["wallet"].as_str().unwrap().to_string();

        run_json(
            LedgerCommand::AddTransaction {
                sender: f.clone(),
                receiver: w1.clone(),
                amount: 5.0,
            },
            dir.path(),
        );

        let balance = run_json(LedgerCommand::GetBalance { wallet: f }, dir.path());
        assert_eq!(balance["balance"], serde_json::json!(95.0));
        let balance = run_json(LedgerCommand::GetBalance { wallet: w1.clone() }, dir.path());
        assert_eq!(balance["balance"], serde_json::json!(15.0));

        let history = run_json(LedgerCommand::QueryTransactions { wallet: w1 }, dir.path());
        assert_eq!(history["transactions"].as_array().unwrap().len(), 2);

        let report = run_json(LedgerCommand::VerifyLedger, dir.path());
        assert_eq!(report["valid"], serde_json::json!(true));
    }

    #[test]
    fn test_rejected_transaction_is_not_saved() {
        let dir = tempdir().unwrap();
        let founder = run_json(LedgerCommand::FounderOnboarding, dir.path());
        let f = founder["foundational_wallet"].as_str().unwrap().to_string();
        let wallet = run_json(LedgerCommand::CreateWallet, dir.path());
        let w = wallet["wallet"].as_str().unwrap().to_string();

        let result = run(
            LedgerCommand::AddTransaction {
                sender: f.clone(),
                receiver: w,
                amount: -5.0,
            },
            dir.path(),
            LedgerConfig::default(),
        );
        assert!(result.is_err());

        let balance = run_json(LedgerCommand::GetBalance { wallet: f }, dir.path());
        assert_eq!(balance["balance"], serde_json::json!(100.0));
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let file = source.path().join("ledger.json");

        run_json(LedgerCommand::FounderOnboarding, source.path());
        run_json(LedgerCommand::StandardOnboarding, source.path());
        let exported = run_json(LedgerCommand::ExportLedger { path: file.clone() }, source.path());

        let report = run_json(LedgerCommand::ImportLedger { path: file }, target.path());
        assert_eq!(report["valid"], serde_json::json!(true));

        let (ledger, _) = open_ledger(target.path(), LedgerConfig::default()).unwrap();
        assert_eq!(
            ledger.root_hash().to_hex().to_string(),
            exported["root_hash"].as_str().unwrap()
        );
        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn test_imported_tampering_survives_restart() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let file = source.path().join("ledger.json");

        run_json(LedgerCommand::FounderOnboarding, source.path());
        run_json(LedgerCommand::StandardOnboarding, source.path());
        run_json(LedgerCommand::ExportLedger { path: file.clone() }, source.path());

        let mut snapshot = LedgerSnapshot::from_json(&std::fs::read_to_string(&file).unwrap()).unwrap();
        snapshot.root.children[0].hash = "ab".repeat(32);
        std::fs::write(&file, snapshot.to_json().unwrap()).unwrap();

        let imported = run_json(LedgerCommand::ImportLedger { path: file }, target.path());
        assert_eq!(imported["valid"], serde_json::json!(false));
        assert_eq!(imported["mismatch"], serde_json::json!({ "level": 1, "index": 0 }));

        let report = run_json(LedgerCommand::VerifyLedger, target.path());
        assert_eq!(report, imported);
    }

    #[test]
    fn test_rejected_import_keeps_data_dir_usable() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let file = source.path().join("ledger.json");

        run_json(LedgerCommand::FounderOnboarding, source.path());
        run_json(LedgerCommand::ExportLedger { path: file.clone() }, source.path());

        let mut snapshot = LedgerSnapshot::from_json(&std::fs::read_to_string(&file).unwrap()).unwrap();
        snapshot.foundational_wallet = None;
        std::fs::write(&file, snapshot.to_json().unwrap()).unwrap();

        let result = run(
            LedgerCommand::ImportLedger { path: file },
            target.path(),
            LedgerConfig::default(),
        );
        assert!(result.is_err());

        let report = run_json(LedgerCommand::VerifyLedger, target.path());
        assert_eq!(report["valid"], serde_json::json!(true));
        let founder = run_json(LedgerCommand::FounderOnboarding, target.path());
        assert!(founder["foundational_wallet"].is_string());
    }

    #[test]
    fn test_visualize_fresh_ledger() {
        let dir = tempdir().unwrap();
        let output = run(LedgerCommand::VisualizeLedger, dir.path(), LedgerConfig::default()).unwrap();
        assert!(output.starts_with("▲ (0, 0) "));
    }
}
