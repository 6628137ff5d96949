//! Payment method and capture details.
//!
//! The checkout engine never interprets `paymentDetails`: it validates the
//! method name and forwards the details untouched. [`Payment::instruction`]
//! decodes the details into a method-specific shape for the collaborator
//! that actually captures the payment.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How the shopper pays. Unrecognized methods are kept as [`PaymentMethod::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Wallet,
    BankTransfer,
    Other(String),
}

impl PaymentMethod {
    /// Parses a method name. Matching ignores case and treats `-` and spaces as `_`.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let normalized: String = trimmed
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "COD" | "CASH" | "CASH_ON_DELIVERY" => PaymentMethod::CashOnDelivery,
            "CARD" | "CREDIT_CARD" | "DEBIT_CARD" => PaymentMethod::Card,
            "WALLET" => PaymentMethod::Wallet,
            "BANK_TRANSFER" => PaymentMethod::BankTransfer,
            _ => PaymentMethod::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Wallet => "WALLET",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Other(name) => name,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, method-dependent capture payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentDetails(Value);

impl PaymentDetails {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// Payment selection carried by a cart and its order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    #[serde(default)]
    pub details: PaymentDetails,
    #[serde(default)]
    pub save: bool,
}

/// Decoded capture instruction, one variant per known method.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentInstruction {
    CashOnDelivery,
    Card { token: String, last4: Option<String> },
    Wallet { wallet_id: String },
    BankTransfer { reference: String },
    Other { method: String, details: Value },
}

#[derive(Debug, Error, PartialEq)]
pub enum PaymentError {
    #[error("invalid {method} payment details: {reason}")]
    InvalidDetails { method: String, reason: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardDetails {
    token: String,
    last4: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletDetails {
    wallet_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankTransferDetails {
    reference: String,
}

impl Payment {
    /// Decodes the details for this payment's method.
    pub fn instruction(&self) -> Result<PaymentInstruction, PaymentError> {
        let invalid = |e: serde_json::Error| PaymentError::InvalidDetails {
            method: self.method.to_string(),
            reason: e.to_string(),
        };
        let details = self.details.as_value().clone();

        match &self.method {
            PaymentMethod::CashOnDelivery => Ok(PaymentInstruction::CashOnDelivery),
            PaymentMethod::Card => {
                let card: CardDetails = serde_json::from_value(details).map_err(invalid)?;
                Ok(PaymentInstruction::Card {
                    token: card.token,
                    last4: card.last4,
                })
            }
            PaymentMethod::Wallet => {
                let wallet: WalletDetails = serde_json::from_value(details).map_err(invalid)?;
                Ok(PaymentInstruction::Wallet {
                    wallet_id: wallet.wallet_id,
                })
            }
            PaymentMethod::BankTransfer => {
                let transfer: BankTransferDetails =
                    serde_json::from_value(details).map_err(invalid)?;
                Ok(PaymentInstruction::BankTransfer {
                    reference: transfer.reference,
                })
            }
            PaymentMethod::Other(name) => Ok(PaymentInstruction::Other {
                method: name.clone(),
                details,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_methods() {
        assert_eq!(PaymentMethod::parse("cod"), PaymentMethod::CashOnDelivery);
        assert_eq!(
            PaymentMethod::parse("cash-on-delivery"),
            PaymentMethod::CashOnDelivery
        );
        assert_eq!(PaymentMethod::parse("Credit Card"), PaymentMethod::Card);
        assert_eq!(PaymentMethod::parse(" wallet "), PaymentMethod::Wallet);
    }

    #[test]
    fn test_unknown_method_is_kept() {
        let method = PaymentMethod::parse("tabby");
        assert_eq!(method, PaymentMethod::Other("tabby".to_string()));
        assert_eq!(method.as_str(), "tabby");
    }

    #[test]
    fn test_method_serializes_canonically() {
        let json = serde_json::to_value(PaymentMethod::parse("cod")).unwrap();
        assert_eq!(json, json!("CASH_ON_DELIVERY"));
    }

    #[test]
    fn test_card_instruction() {
        let payment = Payment {
            method: PaymentMethod::Card,
            details: PaymentDetails::new(json!({ "token": "tok_123", "last4": "4242" })),
            save: true,
        };

        assert_eq!(
            payment.instruction().unwrap(),
            PaymentInstruction::Card {
                token: "tok_123".to_string(),
                last4: Some("4242".to_string()),
            }
        );
    }

    #[test]
    fn test_card_without_token_is_rejected_only_when_decoded() {
        let payment = Payment {
            method: PaymentMethod::Card,
            details: PaymentDetails::new(json!({ "last4": "4242" })),
            save: false,
        };

        let err = payment.instruction().unwrap_err();
        assert!(matches!(err, PaymentError::InvalidDetails { ref method, .. } if method == "CARD"));
    }

    #[test]
    fn test_cash_ignores_details() {
        let payment = Payment {
            method: PaymentMethod::CashOnDelivery,
            details: PaymentDetails::default(),
            save: false,
        };
        assert!(payment.details.is_empty());
        assert_eq!(
            payment.instruction().unwrap(),
            PaymentInstruction::CashOnDelivery
        );
    }

    #[test]
    fn test_other_method_forwards_details() {
        let payment = Payment {
            method: PaymentMethod::parse("tabby"),
            details: PaymentDetails::new(json!({ "installments": 4 })),
            save: false,
        };

        match payment.instruction().unwrap() {
            PaymentInstruction::Other { method, details } => {
                assert_eq!(method, "tabby");
                assert_eq!(details["installments"], 4);
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }
}
