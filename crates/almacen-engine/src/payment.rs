//! # Payment Terminal Port
//!
//! The card-payment collaborator as seen by the engine. The real terminal
//! lives outside this system; the engine only knows the contract: hand over
//! an amount and an order id, get back a receipt or a failure.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleProcessor                     PaymentTerminal                      │
//! │       │                                  │                              │
//! │       │  sale($9.980, "INV-17565...")    │                              │
//! │       │─────────────────────────────────▶│                              │
//! │       │                                  │  (seconds of latency)        │
//! │       │◀─────────────────────────────────│                              │
//! │       │  Ok(CardReceipt)                 │                              │
//! │       │  Err(Declined { code })          │  → sale aborts, no stock     │
//! │       │  Err(Unavailable) / timeout      │    was touched yet           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The terminal is slow and untrusted: the caller wraps every invocation in
//! a timeout and must not mutate any state before the receipt arrives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use almacen_core::Money;

/// How long the engine waits for the terminal before giving up.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Contract
// =============================================================================

/// Successful terminal response.
#[derive(Debug, Clone)]
pub struct CardReceipt {
    pub authorization_code: String,
    /// Amount actually captured. Equal to the requested amount.
    pub amount: Money,
    /// Terminal response code; 0 means approved.
    pub response_code: i64,
    pub transaction_date: DateTime<Utc>,
}

/// Terminal-side failures.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The terminal processed the transaction and declined it.
    #[error("card declined (response code {response_code})")]
    Declined { response_code: i64 },

    /// The terminal could not be reached.
    #[error("terminal unreachable: {0}")]
    Unavailable(String),
}

/// The card-terminal port. Implementations are injected into the
/// SaleProcessor; tests and demos use [`MockTerminal`].
#[async_trait]
pub trait PaymentTerminal: Send + Sync {
    /// Collects a card payment of `amount` under the merchant order id.
    async fn sale(&self, amount: Money, order_id: &str) -> Result<CardReceipt, PaymentError>;
}

// =============================================================================
// Mock Terminal
// =============================================================================

/// What the mock terminal does on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Approve with response code 0.
    Approve,
    /// Decline with the given response code.
    Decline(i64),
    /// Fail as unreachable.
    Unreachable,
    /// Never answer (exercises the caller's timeout).
    Hang,
}

/// Scriptable in-process terminal for demos and tests.
///
/// ## Usage
/// ```rust,ignore
/// let terminal = MockTerminal::approving();
/// terminal.script(MockBehavior::Decline(-1));
/// ```
#[derive(Debug)]
pub struct MockTerminal {
    behavior: Mutex<MockBehavior>,
}

impl MockTerminal {
    /// A terminal that approves everything.
    pub fn approving() -> Self {
        MockTerminal {
            behavior: Mutex::new(MockBehavior::Approve),
        }
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        MockTerminal {
            behavior: Mutex::new(behavior),
        }
    }

    /// Changes the behavior for subsequent calls.
    pub fn script(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl PaymentTerminal for MockTerminal {
    async fn sale(&self, amount: Money, order_id: &str) -> Result<CardReceipt, PaymentError> {
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            MockBehavior::Approve => Ok(CardReceipt {
                authorization_code: format!(
                    "AUTH-{}",
                    order_id.rsplit('-').next().unwrap_or(order_id)
                ),
                amount,
                response_code: 0,
                transaction_date: Utc::now(),
            }),
            MockBehavior::Decline(response_code) => Err(PaymentError::Declined { response_code }),
            MockBehavior::Unreachable => {
                Err(PaymentError::Unavailable("connection refused".to_string()))
            }
            MockBehavior::Hang => {
                // Sleeps far past any sane caller timeout
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PaymentError::Unavailable("unreachable".to_string()))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
