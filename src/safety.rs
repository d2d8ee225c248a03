//! Trading safety policy
//!
//! Pure checks run before any mutating broker call: the order-quantity
//! ceiling and dry-run interception.

use crate::broker::requests::compact_json;
use crate::broker::BrokerRequest;
use crate::config::TradingConfig;
use crate::error::GatewayError;
use crate::Result;
use serde_json::Value;

/// Fails iff `requested_qty > ceiling`.
pub fn check_quantity(requested_qty: u64, ceiling: u64) -> Result<()> {
    if requested_qty > ceiling {
        return Err(GatewayError::SafetyViolation(format!(
            "Order quantity {} exceeds maximum allowed {}",
            requested_qty, ceiling
        )));
    }
    Ok(())
}

/// What the guard decided for a mutating request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Go ahead with the real broker call.
    Proceed,
    /// Dry run: report this instead of calling the broker.
    DryRun(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyGuard {
    max_order_quantity: u64,
    dry_run: bool,
}

impl SafetyGuard {
    pub fn new(config: TradingConfig) -> Self {
        Self {
            max_order_quantity: config.max_order_quantity,
            dry_run: config.dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn max_order_quantity(&self) -> u64 {
        self.max_order_quantity
    }

    /// `Some(message)` when dry-run mode swallows the call.
    pub fn intercept_if_dry_run(
        &self,
        operation_description: &str,
        params: Option<&Value>,
    ) -> Option<String> {
        if !self.dry_run {
            return None;
        }
        Some(match params {
            Some(params) => format!(
                "DRY RUN - {} with params: {}",
                operation_description,
                compact_json(params)
            ),
            None => format!("DRY RUN - {}", operation_description),
        })
    }

    /// Quantity ceiling first, then dry-run interception. Read-only requests
    /// always proceed.
    pub fn check(&self, request: &BrokerRequest) -> Result<GuardOutcome> {
        if !request.is_mutating() {
            return Ok(GuardOutcome::Proceed);
        }

        if let Some(qty) = request.order_quantity() {
            check_quantity(qty, self.max_order_quantity)?;
        }

        let (description, params) = request.dry_run_description();
        Ok(
            match self.intercept_if_dry_run(&description, params.as_ref()) {
                Some(message) => GuardOutcome::DryRun(message),
                None => GuardOutcome::Proceed,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::requests::{CancelOrderParams, OrderParams};

    fn guard(dry_run: bool) -> SafetyGuard {
        SafetyGuard::new(TradingConfig {
            max_order_quantity: 100,
            dry_run,
        })
    }

    fn order(quantity: u64) -> BrokerRequest {
        BrokerRequest::PlaceOrder(OrderParams {
            variety: "NORMAL".into(),
            tradingsymbol: "SBIN-EQ".into(),
            symboltoken: "3045".into(),
            transactiontype: "BUY".into(),
            exchange: "NSE".into(),
            ordertype: "MARKET".into(),
            producttype: "INTRADAY".into(),
            duration: "DAY".into(),
            price: "0".into(),
            quantity,
            squareoff: "0".into(),
            stoploss: "0".into(),
        })
    }

    #[test]
    fn test_check_quantity_boundary() {
        assert!(check_quantity(0, 100).is_ok());
        assert!(check_quantity(100, 100).is_ok());
        let err = check_quantity(101, 100).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(matches!(err, GatewayError::SafetyViolation(_)));
    }

    #[test]
    fn test_dry_run_intercepts_mutating_requests() {
        let outcome = guard(true).check(&order(10)).unwrap();
        match outcome {
            GuardOutcome::DryRun(message) => {
                assert!(message.starts_with("DRY RUN - Order would be placed with params:"));
                assert!(message.contains("SBIN-EQ"));
            }
            other => panic!("expected dry run, got {:?}", other),
        }

        let cancel = BrokerRequest::CancelOrder(CancelOrderParams {
            order_id: "77".into(),
            variety: "NORMAL".into(),
        });
        assert_eq!(
            guard(true).check(&cancel).unwrap(),
            GuardOutcome::DryRun("DRY RUN - Order 77 would be cancelled".into())
        );
    }

    #[test]
    fn test_read_only_requests_ignore_dry_run() {
        assert_eq!(
            guard(true).check(&BrokerRequest::Holdings).unwrap(),
            GuardOutcome::Proceed
        );
    }

    #[test]
    fn test_quantity_checked_before_dry_run() {
        assert!(guard(true).check(&order(101)).is_err());
        assert!(guard(false).check(&order(101)).is_err());
        assert_eq!(guard(false).check(&order(100)).unwrap(), GuardOutcome::Proceed);
    }

    #[test]
    fn test_intercept_disabled_returns_none() {
        assert!(guard(false)
            .intercept_if_dry_run("Order would be placed", None)
            .is_none());
    }
}
