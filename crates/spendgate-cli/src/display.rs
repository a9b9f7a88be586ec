//! Display utilities for the CLI

use colored::*;
use spendgate_core::{EngineError, EventRecord, LedgerEvent, U256};

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print a rejected operation with its error kind
pub fn rejected(err: &EngineError) {
    println!(
        "  {} {:?}: {}",
        "✗".bright_red(),
        err.kind(),
        err.to_string().bright_red()
    );
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

/// Format an amount in base units with thousands separators
pub fn amount(value: U256) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

/// One line per event, indented under the step that produced it
pub fn events(records: &[EventRecord]) {
    for record in records {
        println!(
            "      {} {} {}",
            format!("#{}", record.sequence).bright_black(),
            record.event.name().bright_magenta(),
            event_detail(&record.event)
        );
    }
}

fn event_detail(event: &LedgerEvent) -> String {
    match event {
        LedgerEvent::AgentCreated {
            agent_id, delegate, ..
        } => format!("{agent_id} delegate={delegate}"),
        LedgerEvent::AgentUpdated {
            agent_id, delegate, ..
        } => format!("{agent_id} delegate={delegate}"),
        LedgerEvent::AgentPaused { agent_id, paused } => format!("{agent_id} paused={paused}"),
        LedgerEvent::PolicyLimitsUpdated {
            agent_id,
            daily_limit,
            per_tx_limit,
            spent_today,
        } => format!(
            "{agent_id} daily={} per_tx={} spent={}",
            amount(*daily_limit),
            amount(*per_tx_limit),
            amount(*spent_today)
        ),
        LedgerEvent::MerchantWhitelistUpdated {
            agent_id,
            merchant,
            allowed,
        } => format!("{agent_id} {merchant} allowed={allowed}"),
        LedgerEvent::Deposit {
            agent_id,
            amount: value,
            new_balance,
            ..
        }
        | LedgerEvent::Withdraw {
            agent_id,
            amount: value,
            new_balance,
            ..
        } => format!(
            "{agent_id} amount={} balance={}",
            amount(*value),
            amount(*new_balance)
        ),
        LedgerEvent::EmergencyWithdraw {
            agent_id,
            amount: value,
            ..
        } => format!("{agent_id} amount={}", amount(*value)),
        LedgerEvent::AgentPayment {
            agent_id,
            merchant,
            amount: value,
            payload,
        } => format!(
            "{agent_id} -> {merchant} amount={} payload={}B",
            amount(*value),
            payload.len()
        ),
        LedgerEvent::DailySpendReset {
            agent_id,
            window_start,
        } => format!("{agent_id} window_start={window_start}"),
        LedgerEvent::SubscriptionCreated {
            agent_id,
            subscription_id,
            amount_per_period,
            period_seconds,
            ..
        } => format!(
            "{agent_id} {subscription_id} amount={} every {period_seconds}s",
            amount(*amount_per_period)
        ),
        LedgerEvent::SubscriptionExecuted {
            agent_id,
            subscription_id,
            next_execution_at,
            ..
        } => format!("{agent_id} {subscription_id} next={next_execution_at}"),
        LedgerEvent::SubscriptionStatusChanged {
            agent_id,
            subscription_id,
            active,
        } => format!("{agent_id} {subscription_id} active={active}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_group_by_thousands() {
        assert_eq!(amount(U256::from(0)), "0");
        assert_eq!(amount(U256::from(999)), "999");
        assert_eq!(amount(U256::from(1_000)), "1_000");
        assert_eq!(amount(U256::from(250_000)), "250_000");
        assert_eq!(amount(U256::from(1_000_000)), "1_000_000");
    }
}
