//! Terminal output.
//!
//! Every command result goes through [`Output::show`]: pretty JSON with
//! `--json`, otherwise the text produced by one of the formatters below.
//! Amounts are formatted here and nowhere else.

use anyhow::Result;
use serde::Serialize;

use flexsave_core::config::CURRENCY_SYMBOL;
use flexsave_core::ledger::RemoteWithdrawalPreview;
use flexsave_core::user::{GlobalStats, User, UserDetailStats, UserStats};
use flexsave_core::vault::{HistoryTotals, VaultSummary, Withdrawal, WithdrawalPreview};
use flexsave_core::Money;

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn show<T: Serialize + ?Sized>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    pub fn notice(&self, message: &str) -> Result<()> {
        self.show(&serde_json::json!({ "message": message }), || message.to_string())
    }
}

// ---------------------------------------------------------------------------
// Formatters
// ---------------------------------------------------------------------------

pub fn amount(m: Money) -> String {
    format!("{m} {CURRENCY_SYMBOL}")
}

pub fn progress_bar(pct: u8) -> String {
    let filled = usize::from(pct.min(100)) * BAR_WIDTH / 100;
    format!("[{}{}] {:>3}%", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled), pct)
}

fn lock_label(s: &VaultSummary) -> String {
    match (s.is_active, s.is_locked) {
        (false, _) => "closed".to_string(),
        (true, true) => format!("locked, {} days left", s.days_until_unlock),
        (true, false) => "unlocked".to_string(),
    }
}

pub fn vault_line(s: &VaultSummary) -> String {
    format!(
        "{:<12} {:<24} {} {} / {}  ({})",
        s.id.to_string(),
        s.name,
        progress_bar(s.progress),
        amount(s.current_amount),
        amount(s.target_amount),
        lock_label(s)
    )
}

pub fn vault_list(summaries: &[VaultSummary], portfolio: u8) -> String {
    if summaries.is_empty() {
        return "No vaults yet. Create one with `flexsave vaults create`.".to_string();
    }
    let mut out: Vec<String> = summaries.iter().map(vault_line).collect();
    out.push(format!("Overall {}", progress_bar(portfolio)));
    out.join("\n")
}

pub fn vault_detail(s: &VaultSummary, withdrawals: &[Withdrawal]) -> String {
    let mut out = vec![
        format!("{} ({})", s.name, s.id),
        format!("  Balance       {} of {}", amount(s.current_amount), amount(s.target_amount)),
        format!("  Progress      {}", progress_bar(s.progress)),
        format!("  Unlocks       {} ({})", s.unlock_date, lock_label(s)),
        format!(
            "  Flexibility   {} ({} used of {})",
            s.flexibility_percentage,
            amount(s.flexibility_used),
            amount(s.flexibility_ceiling)
        ),
    ];
    if s.goal_reached {
        out.push(format!("  Goal reached ({}%)", s.raw_progress));
    }
    if s.is_locked {
        out.push(format!("  Early withdrawal up to {}", amount(s.max_withdrawal)));
        if s.sustainable_early_withdrawal < s.max_withdrawal {
            out.push(format!(
                "  Up to {} keeps the remaining allowance intact",
                amount(s.sustainable_early_withdrawal)
            ));
        }
    }
    if !withdrawals.is_empty() {
        out.push("  Withdrawals".to_string());
        out.extend(withdrawals.iter().map(|w| format!("    {}", withdrawal_line(w))));
    }
    out.join("\n")
}

pub fn withdrawal_line(w: &Withdrawal) -> String {
    format!(
        "{}  {:<10} {:>12}  fee {:>10}  net {:>12}  {}{}",
        w.created_at.format("%Y-%m-%d %H:%M"),
        w.vault_id.to_string(),
        amount(w.amount),
        amount(w.fee),
        amount(w.net_amount),
        w.status,
        if w.is_early { "  (early)" } else { "" }
    )
}

pub fn preview_text(p: &WithdrawalPreview, remote: Option<&RemoteWithdrawalPreview>) -> String {
    let mut out = vec![
        format!(
            "{} withdrawal of {} from {}",
            if p.is_early() { "Early" } else { "Standard" },
            amount(p.amount()),
            p.vault_id()
        ),
        format!("  Fee ({})  {}", p.fee_rate(), amount(p.fee())),
        format!("  You receive   {}", amount(p.net_amount())),
    ];
    if p.is_early() {
        out.push(format!(
            "  Flexibility left afterwards {}",
            amount(p.flexibility_remaining())
        ));
    }
    if let Some(r) = remote {
        out.push(format!(
            "  Ledger quote: fee {} ({}%), net {}{}",
            amount(r.fee),
            r.fee_percentage,
            amount(r.net_amount),
            if r.can_withdraw {
                String::new()
            } else {
                format!(", refused: {}", r.message)
            }
        ));
    }
    out.join("\n")
}

pub fn history_text(entries: &[&Withdrawal], totals: &HistoryTotals) -> String {
    if entries.is_empty() {
        return "No withdrawals.".to_string();
    }
    let mut out: Vec<String> = entries.iter().map(|w| withdrawal_line(w)).collect();
    out.push(format!(
        "{} withdrawals ({} early): {} withdrawn, {} in fees, {} received",
        totals.count,
        totals.early_count,
        amount(totals.amount),
        amount(totals.fees),
        amount(totals.net)
    ));
    out.join("\n")
}

pub fn user_line(u: &User) -> String {
    format!(
        "{:<12} {:<28} {:<20} {:<5} score {:<7} {}{}",
        u.id.to_string(),
        u.email,
        u.full_name,
        u.role,
        u.discipline_score.to_string(),
        if u.is_premium { "premium" } else { "free" },
        if u.is_active { "" } else { "  (disabled)" }
    )
}

pub fn dashboard_text(
    user: &User,
    stats: &UserStats,
    summaries: &[VaultSummary],
    portfolio: u8,
) -> String {
    let mut out = vec![
        format!("Hello {}", user.full_name),
        format!(
            "  Saved {} across {} active vaults ({} total)",
            amount(stats.total_saved),
            stats.active_vaults,
            stats.total_vaults
        ),
        format!("  Discipline score {}", stats.discipline_score),
        format!("  Flexibility used {}", amount(stats.flexibility_used)),
        String::new(),
    ];
    out.push(vault_list(summaries, portfolio));
    out.join("\n")
}

pub fn user_detail_text(u: &User, stats: &UserDetailStats) -> String {
    let mut out = vec![
        user_line(u),
        format!(
            "  {} vaults, {} saved, score {}",
            stats.total_vaults,
            amount(stats.total_saved),
            stats.discipline_score
        ),
    ];
    if let Some(last) = stats.last_activity {
        out.push(format!("  Last activity {}", last.format("%Y-%m-%d %H:%M")));
    }
    out.join("\n")
}

pub fn global_stats_text(s: &GlobalStats) -> String {
    [
        format!(
            "Users     {} ({} active, {} premium)",
            s.total_users, s.active_users, s.premium_users
        ),
        format!("Vaults    {} ({} active)", s.total_vaults, s.active_vaults),
        format!("Saved     {}", amount(s.total_saved)),
        format!(
            "Withdrawn {} in {} withdrawals",
            amount(s.total_withdrawn),
            s.total_withdrawals
        ),
        format!("Average discipline score {:.1}", s.avg_discipline_score),
    ]
    .join("\n")
}
