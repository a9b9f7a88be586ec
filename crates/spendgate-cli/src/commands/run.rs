//! Run command - replay a JSON script of steps against a fresh engine
//!
//! A script is a JSON array of steps tagged by `step`: `mint`, `approve`,
//! `invoice_merchant`, `call` (with an optional `expect_error`) and `advance`.
//! `crates/spendgate-cli/scripts/daily_window.json` is a complete example.
//!
//! Outcomes and published events are written to stdout as JSON lines.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spendgate_core::{
    Address, EngineCall, EngineService, ErrorKind, EventPublisher, EventRecord,
    InvoicePullMerchant, PublishError, TokenError, TokenLedger, U256,
};
use tracing::{info, warn};

use super::build_engine;
use crate::config::CliConfig;

/// One scripted action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Seed an external token balance
    Mint { to: Address, amount: U256 },
    /// Owner pre-authorises the custody account to pull deposits
    Approve { owner: Address, amount: U256 },
    /// Register a pull-style merchant that settles invoices
    InvoiceMerchant { address: Address },
    /// Submit an engine call on behalf of `caller`
    Call {
        caller: Address,
        call: EngineCall,
        #[serde(default)]
        expect_error: Option<ErrorKind>,
    },
    /// Move the manual clock forward
    Advance { seconds: u64 },
}

/// Writes every published record to stdout as one JSON line
struct StdoutPublisher;

#[async_trait]
impl EventPublisher for StdoutPublisher {
    async fn publish(&self, records: &[EventRecord]) -> Result<(), PublishError> {
        for record in records {
            let line = serde_json::to_string(&json!({ "event": record }))
                .map_err(|e| PublishError::Serialization(e.to_string()))?;
            println!("{line}");
        }
        Ok(())
    }
}

pub fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    parse_script(&raw).with_context(|| format!("parsing script {}", path.display()))
}

fn parse_script(raw: &str) -> anyhow::Result<Vec<Step>> {
    Ok(serde_json::from_str(raw)?)
}

pub async fn run_script(config: &CliConfig, path: &str, keep_going: bool) -> anyhow::Result<()> {
    let steps = load_script(Path::new(path))?;
    let failures = execute(config, &steps, keep_going).await?;
    if failures > 0 {
        bail!("{failures} step(s) did not go as expected");
    }
    Ok(())
}

/// Execute `steps` and return how many did not go as expected
pub async fn execute(config: &CliConfig, steps: &[Step], keep_going: bool) -> anyhow::Result<usize> {
    let (engine, clock) = build_engine(config)?;
    let custody = engine.custody();
    let service = EngineService::new(engine, Arc::new(StdoutPublisher));
    let mut failures = 0;

    info!(steps = steps.len(), keep_going, "running script");

    for (index, step) in steps.iter().enumerate() {
        let ok = match step {
            Step::Mint { to, amount } => {
                let minted = service
                    .with_engine(|e| e.token_mut().mint(*to, *amount))
                    .await;
                report_token_step(index, "mint", minted.map(|_| ()))
            }
            Step::Approve { owner, amount } => {
                let approved = service
                    .with_engine(|e| e.token_mut().approve(*owner, custody, *amount))
                    .await;
                report_token_step(index, "approve", approved)
            }
            Step::InvoiceMerchant { address } => {
                let merchant = Arc::new(InvoicePullMerchant::new());
                service
                    .with_engine(|e| e.register_merchant(*address, merchant))
                    .await;
                report_done(index, "invoice_merchant");
                true
            }
            Step::Advance { seconds } => {
                let now = clock.advance(*seconds);
                println!(
                    "{}",
                    json!({ "step": index, "op": "advance", "now": now })
                );
                true
            }
            Step::Call {
                caller,
                call,
                expect_error,
            } => {
                let op = call.name();
                let result = service.submit(*caller, call.clone()).await;
                match (result, expect_error) {
                    (Ok(outcome), None) => {
                        println!("{}", json!({ "step": index, "op": op, "outcome": outcome }));
                        true
                    }
                    (Ok(outcome), Some(expected)) => {
                        println!(
                            "{}",
                            json!({
                                "step": index,
                                "op": op,
                                "outcome": outcome,
                                "expected_error": expected,
                            })
                        );
                        false
                    }
                    (Err(err), expected) => {
                        let matched = *expected == Some(err.kind());
                        println!(
                            "{}",
                            json!({
                                "step": index,
                                "op": op,
                                "error": err.kind(),
                                "message": err.to_string(),
                                "expected": matched,
                            })
                        );
                        matched
                    }
                }
            }
        };

        if !ok {
            failures += 1;
            warn!(step = index, "step did not go as expected");
            if !keep_going {
                break;
            }
        }
    }

    Ok(failures)
}

fn report_done(index: usize, op: &str) {
    println!("{}", json!({ "step": index, "op": op, "outcome": "done" }));
}

fn report_token_step(index: usize, op: &str, result: Result<(), TokenError>) -> bool {
    match result {
        Ok(()) => {
            report_done(index, op);
            true
        }
        Err(err) => {
            println!(
                "{}",
                json!({ "step": index, "op": op, "error": err.to_string() })
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendgate_core::AgentId;

    const SCRIPT: &str = r#"[
        { "step": "mint", "to": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a", "amount": "0x989680" },
        { "step": "approve", "owner": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a", "amount": "0x989680" },
        { "step": "call", "caller": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
          "call": { "op": "create_agent",
                    "delegate": "0x0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d",
                    "daily_limit": "0xf4240", "per_tx_limit": "0x3d090" } },
        { "step": "call", "caller": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
          "call": { "op": "deposit", "agent_id": 1, "amount": "0xf4240" } },
        { "step": "call", "caller": "0x0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d",
          "expect_error": "MerchantNotAllowed",
          "call": { "op": "pay", "agent_id": 1,
                    "merchant": "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a", "amount": "0x1" } },
        { "step": "advance", "seconds": 60 }
    ]"#;

    #[test]
    fn script_steps_parse() {
        let steps = parse_script(SCRIPT).unwrap();
        assert_eq!(steps.len(), 6);
        assert!(matches!(
            &steps[4],
            Step::Call {
                expect_error: Some(ErrorKind::MerchantNotAllowed),
                ..
            }
        ));
        assert!(matches!(steps[5], Step::Advance { seconds: 60 }));
    }

    #[tokio::test]
    async fn expected_rejections_are_not_failures() {
        let steps = parse_script(SCRIPT).unwrap();
        let failures = execute(&CliConfig::default(), &steps, false).await.unwrap();
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn unexpected_rejections_stop_the_run() {
        let mut steps = parse_script(SCRIPT).unwrap();
        if let Step::Call { expect_error, .. } = &mut steps[4] {
            *expect_error = None;
        }
        let failures = execute(&CliConfig::default(), &steps, false).await.unwrap();
        assert_eq!(failures, 1);

        steps.push(Step::Call {
            caller: Address::repeat_byte(0x0d),
            call: EngineCall::BalanceOf {
                agent_id: AgentId::new(2),
            },
            expect_error: Some(ErrorKind::AgentNotFound),
        });
        let failures = execute(&CliConfig::default(), &steps, true).await.unwrap();
        // balance reads never fail, so the last step counts too
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn sample_script_runs_cleanly() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts/daily_window.json");
        let steps = load_script(&path).unwrap();
        assert!(steps
            .iter()
            .any(|s| matches!(s, Step::InvoiceMerchant { .. })));

        let failures = execute(&CliConfig::default(), &steps, false).await.unwrap();
        assert_eq!(failures, 0);
    }
}
