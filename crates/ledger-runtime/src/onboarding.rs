//! Onboarding Service
//!
//! Founder onboarding runs once per ledger: it creates the foundational
//! wallet, forms the genesis triad and mints the founder grant. Standard
//! onboarding is repeatable and mints a fixed grant into a fresh wallet.

use crate::{
    engine::LedgerEngine,
    error::{LedgerResult, PreconditionError},
    keyring::Keyring,
    Amount, MINT_ADDRESS,
};
use serde::{Deserialize, Serialize};

/// Lifecycle of a ledger instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum LedgerStage {
    Uninitialized,
    FounderOnboarded { foundational_wallet: String },
}

impl LedgerStage {
    pub fn foundational_wallet(&self) -> Option<&str> {
        match self {
            LedgerStage::Uninitialized => None,
            LedgerStage::FounderOnboarded { foundational_wallet } => Some(foundational_wallet),
        }
    }

    pub fn is_onboarded(&self) -> bool {
        matches!(self, LedgerStage::FounderOnboarded { .. })
    }

    /// Error unless founder onboarding has happened
    pub fn require_onboarded(&self) -> Result<(), PreconditionError> {
        if self.is_onboarded() {
            Ok(())
        } else {
            Err(PreconditionError::NotOnboarded)
        }
    }
}

/// Result of founder onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderOnboarding {
    pub foundational_wallet: String,
    pub initial_balance: Amount,
}

/// Result of standard onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardOnboarding {
    pub wallet: String,
    pub initial_balance: Amount,
}

/// Creates wallets and mints their starting balances
#[derive(Debug, Clone, Copy)]
pub struct OnboardingService {
    founder_grant: Amount,
    standard_grant: Amount,
}

impl OnboardingService {
    pub fn new(founder_grant: Amount, standard_grant: Amount) -> Self {
        Self {
            founder_grant,
            standard_grant,
        }
    }

    pub fn founder_grant(&self) -> Amount {
        self.founder_grant
    }

    pub fn standard_grant(&self) -> Amount {
        self.standard_grant
    }

    /// One-time bootstrap. On any failure the keyring, engine and stage are
    /// left as they were.
    pub fn founder_onboarding(
        &self,
        engine: &mut LedgerEngine,
        keyring: &mut Keyring,
        stage: &mut LedgerStage,
    ) -> LedgerResult<FounderOnboarding> {
        if stage.is_onboarded() {
            return Err(PreconditionError::AlreadyOnboarded.into());
        }
        if keyring.mint_authority() != engine.mint_authority() {
            return Err(PreconditionError::ForeignMintAuthority.into());
        }

        let wallet = keyring.create_wallet();
        let tx = engine.prepare(MINT_ADDRESS, &wallet, self.founder_grant, keyring.mint_signer());
        if let Err(e) = engine.genesis(tx) {
            keyring.remove(&wallet);
            return Err(e);
        }

        *stage = LedgerStage::FounderOnboarded {
            foundational_wallet: wallet.clone(),
        };
        tracing::info!(
            "Founder onboarding complete: foundational wallet {} credited {}",
            wallet,
            self.founder_grant
        );

        Ok(FounderOnboarding {
            foundational_wallet: wallet,
            initial_balance: self.founder_grant,
        })
    }

    /// Repeatable bootstrap of a funded wallet
    pub fn standard_onboarding(
        &self,
        engine: &mut LedgerEngine,
        keyring: &mut Keyring,
        stage: &LedgerStage,
    ) -> LedgerResult<StandardOnboarding> {
        stage.require_onboarded()?;
        if keyring.mint_authority() != engine.mint_authority() {
            return Err(PreconditionError::ForeignMintAuthority.into());
        }

        let wallet = keyring.create_wallet();
        let tx = engine.prepare(MINT_ADDRESS, &wallet, self.standard_grant, keyring.mint_signer());
        if let Err(e) = engine.mint(tx) {
            keyring.remove(&wallet);
            return Err(e.into());
        }

        tracing::info!(
            "Standard onboarding complete: wallet {} credited {}",
            wallet,
            self.standard_grant
        );

        Ok(StandardOnboarding {
            wallet,
            initial_balance: self.standard_grant,
        })
    }
}
