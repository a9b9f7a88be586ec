//! Demo command - walks the reference scenarios step by step

use std::sync::Arc;

use anyhow::{bail, ensure};
use colored::*;
use spendgate_core::{
    encode_invoice_payload, Address, AgentId, Bytes, ErrorKind, InMemoryToken,
    InvoicePullMerchant, PaymentEngine, Timestamp, TokenLedger, U256,
};

use super::build_engine;
use crate::config::CliConfig;
use crate::display;

const OWNER: Address = Address::repeat_byte(0x0a);
const DELEGATE: Address = Address::repeat_byte(0x0d);
const SHOP: Address = Address::repeat_byte(0x5a);
const BILLING: Address = Address::repeat_byte(0xb1);

const OWNER_FUNDS: u64 = 10_000_000;

type Engine = PaymentEngine<InMemoryToken>;

fn amt(v: u64) -> U256 {
    U256::from(v)
}

/// Print whatever the last step committed
fn flush(engine: &mut Engine) {
    display::events(&engine.drain_events());
}

/// Run every scenario against its own fresh engine
pub fn run_demo(config: &CliConfig) -> anyhow::Result<()> {
    println!(
        "{}",
        "Spendgate: bounded spending authority for delegated agents"
            .bright_white()
            .bold()
    );
    println!("  • {} per-transaction and daily caps", "Enforced".bright_green());
    println!("  • {} merchant allow-list", "Deny-by-default".bright_green());
    println!("  • {} owner exit", "Unconditional".bright_green());

    scenario_create_agent(config)?;
    scenario_direct_transfer(config)?;
    scenario_invoice_pull(config)?;
    scenario_window_reset(config)?;
    scenario_emergency_exit(config)?;
    scenario_per_tx_cap(config)?;

    display::section("All scenarios completed");
    Ok(())
}

/// Fresh engine with the owner funded and custody pre-authorised, plus one agent
fn setup(config: &CliConfig, daily: u64, per_tx: u64) -> anyhow::Result<(Engine, AgentId)> {
    let (mut engine, _) = build_engine(config)?;
    let custody = engine.custody();
    engine.token_mut().mint(OWNER, amt(OWNER_FUNDS))?;
    engine
        .token_mut()
        .approve(OWNER, custody, amt(OWNER_FUNDS))?;
    let agent_id = engine.create_agent(OWNER, DELEGATE, amt(daily), amt(per_tx))?;
    Ok((engine, agent_id))
}

fn scenario_create_agent(config: &CliConfig) -> anyhow::Result<()> {
    display::section("A. Create an agent");
    let (mut engine, agent_id) = setup(config, 1_000_000, 250_000)?;
    display::success(&format!("Created {agent_id}"));
    flush(&mut engine);

    let policy = engine.agent(agent_id)?.policy;
    display::kv("active", &policy.active.to_string());
    display::kv("daily limit", &display::amount(policy.daily_limit));
    display::kv("per-tx limit", &display::amount(policy.per_tx_limit));
    display::kv("window start", &policy.window_start.to_string());
    ensure!(policy.active, "new agents start active");
    Ok(())
}

fn scenario_direct_transfer(config: &CliConfig) -> anyhow::Result<()> {
    display::section("B. Direct transfer to a merchant");
    let (mut engine, agent_id) = setup(config, 1_000_000, 250_000)?;
    flush(&mut engine);

    engine.deposit(OWNER, agent_id, amt(1_000_000))?;
    display::success("Owner deposited 1_000_000");
    flush(&mut engine);

    engine.set_merchant_whitelist(OWNER, agent_id, SHOP, true)?;
    display::success(&format!("Whitelisted {SHOP}"));
    flush(&mut engine);

    engine.pay(DELEGATE, agent_id, SHOP, amt(200_000), Bytes::new())?;
    display::success("Delegate paid 200_000 with an empty payload");
    flush(&mut engine);

    display::kv("merchant balance", &display::amount(engine.token().balance_of(SHOP)));
    display::kv("agent balance", &display::amount(engine.balance_of(agent_id)));
    display::kv("spent today", &display::amount(engine.spent_today(agent_id)?));
    ensure!(engine.balance_of(agent_id) == amt(800_000), "agent balance mismatch");
    Ok(())
}

fn scenario_invoice_pull(config: &CliConfig) -> anyhow::Result<()> {
    display::section("C. Pull payment carrying an invoice");
    let (mut engine, agent_id) = setup(config, 1_000_000, 250_000)?;
    let billing = Arc::new(InvoicePullMerchant::new());
    engine.register_merchant(BILLING, billing.clone());
    engine.deposit(OWNER, agent_id, amt(1_000_000))?;
    engine.set_merchant_whitelist(OWNER, agent_id, BILLING, true)?;
    flush(&mut engine);

    let payload = encode_invoice_payload(U256::from(123));
    engine.pay(DELEGATE, agent_id, BILLING, amt(100_000), payload)?;
    display::success("Delegate paid invoice 123 for 100_000");
    flush(&mut engine);

    let invoice = billing
        .last_invoice_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    display::kv("merchant pulled", &display::amount(engine.token().balance_of(BILLING)));
    display::kv("invoice seen by merchant", &invoice);
    display::kv(
        "outstanding authorisation",
        &display::amount(engine.token().allowance(engine.custody(), BILLING)),
    );
    ensure!(
        billing.last_invoice_id() == Some(U256::from(123)),
        "merchant did not observe the invoice"
    );
    Ok(())
}

fn scenario_window_reset(config: &CliConfig) -> anyhow::Result<()> {
    display::section("D. Daily window reset");
    let (mut engine, clock) = build_engine(config)?;
    let custody = engine.custody();
    engine.token_mut().mint(OWNER, amt(OWNER_FUNDS))?;
    engine
        .token_mut()
        .approve(OWNER, custody, amt(OWNER_FUNDS))?;
    let agent_id = engine.create_agent(OWNER, DELEGATE, amt(1_000_000), amt(1_000_000))?;
    engine.deposit(OWNER, agent_id, amt(2_000_000))?;
    engine.set_merchant_whitelist(OWNER, agent_id, SHOP, true)?;
    flush(&mut engine);

    engine.pay(DELEGATE, agent_id, SHOP, amt(900_000), Bytes::new())?;
    display::success("Paid 900_000");
    display::kv("spent today", &display::amount(engine.spent_today(agent_id)?));
    flush(&mut engine);

    let window = engine.config().window_seconds;
    let now: Timestamp = clock.advance(window + 1);
    display::info(&format!("Clock advanced to {now}"));
    display::kv("spent today", &display::amount(engine.spent_today(agent_id)?));

    engine.pay(DELEGATE, agent_id, SHOP, amt(800_000), Bytes::new())?;
    display::success("Paid 800_000 in the new window");
    flush(&mut engine);

    let spent = engine.spent_today(agent_id)?;
    display::kv("spent today", &display::amount(spent));
    ensure!(spent == amt(800_000), "window did not reset");
    Ok(())
}

fn scenario_emergency_exit(config: &CliConfig) -> anyhow::Result<()> {
    display::section("E. Emergency withdraw from a paused agent");
    let (mut engine, agent_id) = setup(config, 1_000_000, 250_000)?;
    engine.deposit(OWNER, agent_id, amt(750_000))?;
    engine.set_policy_active(OWNER, agent_id, false)?;
    flush(&mut engine);

    let before = engine.token().balance_of(OWNER);
    let recovered = engine.emergency_withdraw(OWNER, agent_id)?;
    display::success(&format!("Recovered {}", display::amount(recovered)));
    flush(&mut engine);

    let gained = engine.token().balance_of(OWNER) - before;
    display::kv("agent balance", &display::amount(engine.balance_of(agent_id)));
    display::kv("owner gained", &display::amount(gained));
    ensure!(gained == amt(750_000), "owner did not recover the full balance");
    Ok(())
}

fn scenario_per_tx_cap(config: &CliConfig) -> anyhow::Result<()> {
    display::section("F. Per-transaction cap");
    let (mut engine, agent_id) = setup(config, 1_000_000, 250_000)?;
    engine.deposit(OWNER, agent_id, amt(1_000_000))?;
    engine.set_merchant_whitelist(OWNER, agent_id, SHOP, true)?;
    flush(&mut engine);

    match engine.pay(DELEGATE, agent_id, SHOP, amt(300_000), Bytes::new()) {
        Ok(()) => bail!("payment above the per-transaction cap was accepted"),
        Err(err) => {
            display::rejected(&err);
            ensure!(
                err.kind() == ErrorKind::PerTxLimitExceeded,
                "unexpected rejection: {err}"
            );
        }
    }
    flush(&mut engine);

    display::kv("agent balance", &display::amount(engine.balance_of(agent_id)));
    display::kv("spent today", &display::amount(engine.spent_today(agent_id)?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scenarios_hold() {
        run_demo(&CliConfig::default()).unwrap();
    }
}
