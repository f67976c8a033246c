//! Plain-text status replies for the signal channel.

use crate::errors::TradeError;
use crate::exchange::ProtectionMode;
use crate::execution::Execution;
use crate::models::{Outcome, TradeSignal, TriggerKind, TriggerOrder};

/// One-line summary of what was parsed, e.g. `BTCUSDT LONG x10`.
pub fn format_signal(signal: &TradeSignal) -> String {
    let mut line = format!("{} {} x{}", signal.symbol, signal.direction, signal.leverage);
    if let Some(zone) = &signal.entry_zone {
        line.push_str(&format!(" | entry {}-{}", zone.low, zone.high));
    }
    if let Some(stop) = signal.stop_loss {
        line.push_str(&format!(" | SL {stop}"));
    }
    if !signal.targets.is_empty() {
        let targets: Vec<String> = signal.targets.iter().map(|t| t.to_string()).collect();
        line.push_str(&format!(" | TP {}", targets.join(", ")));
    }
    line
}

/// Status for a signal that reached the exchange (or would have, in dry-run).
pub fn format_execution(signal: &TradeSignal, execution: &Execution, exchange: &str) -> String {
    let intent = &execution.intent;
    let header = if execution.dry_run {
        format!("Dry run on {exchange}, nothing sent")
    } else {
        format!("Order placed on {exchange}")
    };

    let mut lines = vec![
        header,
        format_signal(signal),
        format!(
            "{} {} {} @ ~{} (margin {} USDT)",
            intent.side,
            intent.quantity,
            intent.exchange_symbol,
            intent.reference_price.round_dp(8).normalize(),
            intent.notional_amount.round_dp(2),
        ),
    ];

    if !execution.dry_run {
        lines.push(format!("Order id: {}", execution.entry.order_id));
    }

    match execution.protection_mode {
        ProtectionMode::Separate if execution.dry_run => {
            lines.extend(
                intent
                    .trigger_orders()
                    .iter()
                    .map(|t| format!("{}: planned", trigger_label(t))),
            );
        }
        ProtectionMode::Separate => {
            lines.extend(
                execution
                    .protection
                    .iter()
                    .map(|(t, outcome)| format!("{}: {}", trigger_label(t), outcome_label(outcome))),
            );
        }
        ProtectionMode::Embedded => {
            let label = if execution.dry_run { "planned on entry" } else { "attached to entry" };
            lines.extend(
                execution
                    .attached
                    .iter()
                    .map(|t| format!("{}: {label}", trigger_label(t))),
            );
            // only what rode on the entry is live; the rest of the plan is not
            let sent_targets = execution
                .attached
                .iter()
                .filter(|t| t.kind == TriggerKind::TakeProfit)
                .count();
            lines.extend(intent.take_profit_plan.iter().skip(sent_targets).map(|leg| {
                format!("TP {}: not placed, {exchange} takes one target per order", leg.price)
            }));
        }
    }

    if intent.stop_loss_price.is_none() {
        lines.push("No stop-loss in signal".to_string());
    }

    lines.join("\n")
}

/// Status for a signal that was recognised but not traded.
pub fn format_failure(signal: &TradeSignal, error: &TradeError) -> String {
    let reason = match error {
        TradeError::Validation(msg) => format!("Invalid signal: {msg}"),
        TradeError::PriceUnavailable { reason, .. } => format!("No price available: {reason}"),
        TradeError::UntradableSize { quantity, .. } => {
            format!("Order size {quantity} is below the exchange minimum")
        }
        TradeError::Rejected { code, message } => format!("Rejected by exchange [{code}]: {message}"),
        TradeError::Transport { attempts, cause } => {
            format!("Exchange unreachable after {attempts} attempt(s): {cause}")
        }
    };
    format!("{} not traded\n{reason}", signal.symbol)
}

fn trigger_label(order: &TriggerOrder) -> String {
    match order.kind {
        TriggerKind::StopLoss => format!("SL {}", order.trigger_price),
        TriggerKind::TakeProfit => format!("TP {} size {}", order.trigger_price, order.size),
    }
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Placed(p) => format!("placed ({})", p.order_id),
        Outcome::Rejected { code, message } => format!("rejected [{code}]: {message}"),
        Outcome::TransportFailure(cause) => format!("failed: {cause}"),
    }
}
