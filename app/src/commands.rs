//! # Command Dispatch
//!
//! Each command is treated as a navigation: its route goes through the
//! [`RouteGuard`] first, then the command runs against the ledger. Anything
//! that moves money is checked locally by the vault policy before the
//! request is sent, so the user sees the same rejection the ledger would
//! give without a round trip.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::io::BufRead;

use flexsave_core::auth::{
    guard::redirect_target, BearerToken, GuardDecision, Locale, RedirectReason, RouteGuard,
    SessionContext, SessionError,
};
use flexsave_core::ledger::{LedgerClient, LedgerError, WithdrawalRequest};
use flexsave_core::user::{AdminUserUpdate, ProfileUpdate, User, UserFilter, UserId, UserStats};
use flexsave_core::vault::{
    policy, portfolio_progress, FeeSchedule, PolicyError, Vault, VaultDraft, VaultId,
    VaultSummary, WithdrawalHistory,
};
use flexsave_core::{Money, Percent};

use crate::cli::{
    AdminCommand, Commands, HistoryArgs, LoginArgs, ProfileArgs, RegisterArgs, VaultCommand,
};
use crate::render::{self, Output};

/// Everything a command needs, built once per invocation.
pub struct App {
    session: SessionContext,
    guard: RouteGuard,
    fees: FeeSchedule,
    locale: Locale,
    out: Output,
}

impl App {
    pub fn new(session: SessionContext, locale: Locale, out: Output) -> Self {
        Self {
            session,
            guard: RouteGuard::default(),
            fees: FeeSchedule::default(),
            locale,
            out,
        }
    }

    pub fn shutdown(self) {
        self.session.shutdown();
    }

    // -- error translation ---------------------------------------------------

    fn session_err(&self, e: SessionError) -> anyhow::Error {
        let message = e.user_message(self.locale);
        anyhow::Error::new(e).context(message)
    }

    fn policy_err(e: PolicyError) -> anyhow::Error {
        anyhow::Error::new(e).context("refused before reaching the ledger")
    }

    async fn token(&self) -> Result<BearerToken> {
        self.session.bearer_token().await.map_err(|e| self.session_err(e))
    }

    fn ledger(&self) -> &LedgerClient {
        self.session.ledger()
    }

    fn user(&self) -> Result<User> {
        self.session
            .current_user()
            .ok_or_else(|| self.session_err(SessionError::NotAuthenticated))
    }

    async fn vault(&self, token: &BearerToken, id: &VaultId) -> Result<Vault> {
        let found = self.ledger().get_vault(token, id).await.map_err(ledger_err)?;
        let remote = found.ok_or_else(|| anyhow!("vault {id} not found"))?;
        if !remote.lock_state_agrees(Utc::now()) {
            tracing::warn!(vault = %id, "ledger and local clock disagree on the lock state");
        }
        Ok(remote.into())
    }

    // -- dispatch --------------------------------------------------------------

    pub async fn run(&self, command: Commands) -> Result<()> {
        if let Some(route) = command.route() {
            match self.guard.check(&route, self.session.observer().guard_context()) {
                GuardDecision::Allow => {}
                GuardDecision::Redirect { location, reason } => {
                    return self.redirected(&location, reason);
                }
            }
        }

        match command {
            Commands::Login(args) => self.login(args).await,
            Commands::Register(args) => self.register(args).await,
            Commands::ForgotPassword { email } => self.forgot_password(&email).await,
            Commands::Logout => self.logout().await,
            Commands::Dashboard => self.dashboard().await,
            Commands::Vaults(cmd) => self.vaults(cmd).await,
            Commands::History(args) => self.history(args).await,
            Commands::Profile(args) => self.profile(args).await,
            Commands::Admin(cmd) => self.admin(cmd).await,
            Commands::Route { path } => self.route(&path),
            Commands::Version => Ok(()),
        }
    }

    fn redirected(&self, location: &str, reason: RedirectReason) -> Result<()> {
        match reason {
            RedirectReason::LoginRequired => {
                let query = location.split_once('?').map(|(_, q)| q).unwrap_or_default();
                let next = redirect_target(query, self.guard.landing_route());
                bail!(
                    "{} (flexsave login --email <email> --redirect {next})",
                    SessionError::NotAuthenticated.user_message(self.locale)
                )
            }
            RedirectReason::AlreadyAuthenticated => {
                let name = self.user().map(|u| u.email).unwrap_or_default();
                self.out.notice(&format!(
                    "Already signed in as {name}; continue at {location} or run `flexsave logout`."
                ))
            }
            RedirectReason::AdminRequired => bail!("this command needs the admin role"),
        }
    }

    fn route(&self, path: &str) -> Result<()> {
        let class = self.guard.classify(path);
        let decision = self.guard.check(path, self.session.observer().guard_context());
        let text = match &decision {
            GuardDecision::Allow => format!("{path}: {class:?}, allowed"),
            GuardDecision::Redirect { location, reason } => {
                format!("{path}: {class:?}, redirect to {location} ({reason:?})")
            }
        };
        let value = serde_json::json!({
            "path": path,
            "class": format!("{class:?}"),
            "allowed": decision.is_allowed(),
            "redirect": match &decision {
                GuardDecision::Redirect { location, .. } => Some(location.as_str()),
                GuardDecision::Allow => None,
            },
        });
        self.out.show(&value, || text)
    }

    // -- auth --------------------------------------------------------------------

    async fn login(&self, args: LoginArgs) -> Result<()> {
        let password = password_or_stdin(args.password)?;
        let user = self
            .session
            .login(&args.email, &password)
            .await
            .map_err(|e| self.session_err(e))?;

        let next = args
            .redirect
            .as_deref()
            .map(|path| redirect_target(&format!("redirect={path}"), self.guard.landing_route()))
            .unwrap_or_else(|| self.guard.landing_route().to_string());
        // the target may be an admin page the user cannot open
        let next = match self.guard.check(&next, self.session.observer().guard_context()) {
            GuardDecision::Allow => next,
            GuardDecision::Redirect { location, .. } => location,
        };
        self.out.show(&user, || {
            format!("Signed in as {} ({}). Continue at {next}.", user.full_name, user.email)
        })
    }

    async fn register(&self, args: RegisterArgs) -> Result<()> {
        let password = password_or_stdin(args.password)?;
        let user = self
            .session
            .register(&args.email, &password, &args.name)
            .await
            .map_err(|e| self.session_err(e))?;
        self.out.show(&user, || {
            format!("Welcome {}! Your account is ready.", user.full_name)
        })
    }

    async fn forgot_password(&self, email: &str) -> Result<()> {
        self.session
            .reset_password(email)
            .await
            .map_err(|e| self.session_err(e))?;
        let message = match self.locale {
            Locale::Fr => "Email de réinitialisation envoyé",
            Locale::En => "Password reset email sent",
        };
        self.out.notice(message)
    }

    async fn logout(&self) -> Result<()> {
        self.session.logout().await.map_err(|e| self.session_err(e))?;
        self.out.notice("Signed out.")
    }

    // -- dashboard -----------------------------------------------------------------

    async fn dashboard(&self) -> Result<()> {
        let user = self.session.refresh_user().await.map_err(|e| self.session_err(e))?;
        let token = self.token().await?;
        let vaults: Vec<Vault> = self
            .ledger()
            .list_vaults(&token, true)
            .await
            .map_err(ledger_err)?
            .into_iter()
            .map(Vault::from)
            .collect();

        let stats = match self.ledger().user_stats(&token).await {
            Ok(stats) => stats,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "stats unavailable, deriving from vault list");
                UserStats::from_vaults(&vaults, user.discipline_score)
            }
            Err(e) => return Err(ledger_err(e)),
        };

        let now = Utc::now();
        let summaries: Vec<VaultSummary> = vaults
            .iter()
            .map(|v| VaultSummary::from_vault(v, now))
            .collect();
        let portfolio = portfolio_progress(&vaults);
        let value = serde_json::json!({
            "user": user,
            "stats": stats,
            "vaults": summaries,
            "portfolio_progress": portfolio,
        });
        self.out
            .show(&value, || render::dashboard_text(&user, &stats, &summaries, portfolio))
    }

    // -- vaults ----------------------------------------------------------------------

    async fn vaults(&self, cmd: VaultCommand) -> Result<()> {
        let token = self.token().await?;
        let now = Utc::now();

        match cmd {
            VaultCommand::List { all } => {
                let vaults: Vec<Vault> = self
                    .ledger()
                    .list_vaults(&token, !all)
                    .await
                    .map_err(ledger_err)?
                    .into_iter()
                    .map(Vault::from)
                    .collect();
                let summaries: Vec<VaultSummary> =
                    vaults.iter().map(|v| VaultSummary::from_vault(v, now)).collect();
                let portfolio = portfolio_progress(&vaults);
                self.out
                    .show(&summaries, || render::vault_list(&summaries, portfolio))
            }

            VaultCommand::Show { id } => {
                let id = VaultId(id);
                let vault = self.vault(&token, &id).await?;
                let withdrawals = self
                    .ledger()
                    .list_withdrawals(&token, Some(&id))
                    .await
                    .map_err(ledger_err)?;
                let history = WithdrawalHistory::new(withdrawals);
                let entries: Vec<_> = history.for_vault(&id).cloned().collect();
                let summary = VaultSummary::from_vault(&vault, now);
                let value = serde_json::json!({ "vault": summary, "withdrawals": entries });
                self.out
                    .show(&value, || render::vault_detail(&summary, &entries))
            }

            VaultCommand::Create {
                name,
                target,
                unlock,
                flexibility,
            } => {
                let pct = Percent::new(flexibility).context("invalid flexibility percentage")?;
                let draft = VaultDraft::new(name.trim(), target, unlock).with_flexibility(pct);
                policy::validate_new_vault(&draft, now.date_naive()).map_err(Self::policy_err)?;

                let created = self
                    .ledger()
                    .create_vault(&token, &draft)
                    .await
                    .map_err(ledger_err)?;
                tracing::info!(vault = %created.vault.id, "vault created");
                let summary = VaultSummary::from_vault(&created.vault, now);
                self.out.show(&summary, || {
                    format!("Created vault\n{}", render::vault_line(&summary))
                })
            }

            VaultCommand::Deposit { id, amount } => {
                let id = VaultId(id);
                let vault = self.vault(&token, &id).await?;
                let expected = policy::apply_deposit(&vault, amount).map_err(Self::policy_err)?;

                let updated: Vault = self
                    .ledger()
                    .deposit(&token, &id, amount)
                    .await
                    .map_err(ledger_err)?
                    .into();
                if updated.current_amount != expected.current_amount {
                    tracing::warn!(
                        vault = %id,
                        expected = %expected.current_amount,
                        actual = %updated.current_amount,
                        "ledger balance differs from local projection"
                    );
                }
                let score = self.user()?.discipline_score;
                let summary = VaultSummary::from_vault(&updated, now);
                self.out.show(&summary, || {
                    format!(
                        "Deposited {}\n{}\nDiscipline score {} -> {}",
                        render::amount(amount),
                        render::vault_line(&summary),
                        score,
                        score.after_deposit()
                    )
                })
            }

            VaultCommand::Withdraw { id, amount, dry_run } => {
                self.withdraw(&token, VaultId(id), amount, dry_run).await
            }

            VaultCommand::Close { id } => {
                let id = VaultId(id);
                let vault = self.vault(&token, &id).await?;
                policy::can_close(&vault, now).map_err(Self::policy_err)?;
                self.ledger().close_vault(&token, &id).await.map_err(ledger_err)?;
                self.out.notice(&format!("Vault {} closed.", vault.name))
            }
        }
    }

    async fn withdraw(
        &self,
        token: &BearerToken,
        id: VaultId,
        amount: Money,
        dry_run: bool,
    ) -> Result<()> {
        let user = self.user()?;
        let vault = self.vault(token, &id).await?;
        let rate = self.fees.early_rate_for(user.is_premium);
        let preview = policy::preview_withdrawal(&vault, amount, rate, Utc::now())
            .map_err(Self::policy_err)?;

        let request = WithdrawalRequest {
            vault_id: id.clone(),
            amount,
            is_early_withdrawal: preview.is_early(),
        };

        if dry_run {
            let remote = self
                .ledger()
                .preview_withdrawal(token, &request)
                .await
                .map_err(ledger_err)?;
            if remote.fee != preview.fee() {
                tracing::warn!(local = %preview.fee(), ledger = %remote.fee, "fee quotes differ");
            }
            let value = serde_json::json!({ "preview": preview, "ledger": remote });
            return self
                .out
                .show(&value, || render::preview_text(&preview, Some(&remote)));
        }

        let projected = policy::apply_withdrawal(&vault, &preview).map_err(Self::policy_err)?;
        let withdrawal = self
            .ledger()
            .create_withdrawal(token, &request)
            .await
            .map_err(ledger_err)?;
        tracing::info!(
            withdrawal = %withdrawal.id,
            early = withdrawal.is_early,
            "withdrawal recorded"
        );

        let summary = VaultSummary::from_vault(&projected, Utc::now());
        let value = serde_json::json!({ "withdrawal": withdrawal, "vault": summary });
        self.out.show(&value, || {
            let mut text = format!(
                "{}\n{}",
                render::preview_text(&preview, None),
                render::vault_line(&summary)
            );
            if withdrawal.is_early {
                let score = user.discipline_score;
                text.push_str(&format!(
                    "\nDiscipline score {} -> {}",
                    score,
                    score.after_early_withdrawal()
                ));
            }
            text
        })
    }

    // -- history & profile -------------------------------------------------------------

    async fn history(&self, args: HistoryArgs) -> Result<()> {
        let token = self.token().await?;
        let vault = args.vault.map(VaultId);
        let withdrawals = self
            .ledger()
            .list_withdrawals(&token, vault.as_ref())
            .await
            .map_err(ledger_err)?;
        let history = WithdrawalHistory::new(withdrawals);
        let entries: Vec<_> = history.iter(args.filter).collect();
        let totals = history.totals(args.filter);
        let value = serde_json::json!({ "withdrawals": entries, "totals": totals });
        self.out
            .show(&value, || render::history_text(&entries, &totals))
    }

    async fn profile(&self, args: ProfileArgs) -> Result<()> {
        let update = ProfileUpdate {
            full_name: args.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            notification_enabled: args.notifications,
        };
        if update == ProfileUpdate::default() {
            let user = self.user()?;
            return self.out.show(&user, || render::user_line(&user));
        }

        let token = self.token().await?;
        self.ledger()
            .update_profile(&token, &update)
            .await
            .map_err(ledger_err)?;
        let user = self.session.refresh_user().await.map_err(|e| self.session_err(e))?;
        self.out
            .show(&user, || format!("Profile updated\n{}", render::user_line(&user)))
    }

    // -- admin -------------------------------------------------------------------------

    async fn admin(&self, cmd: AdminCommand) -> Result<()> {
        let token = self.token().await?;
        let ledger = self.ledger();

        match cmd {
            AdminCommand::Stats => {
                let stats = ledger.global_stats(&token).await.map_err(ledger_err)?;
                self.out.show(&stats, || render::global_stats_text(&stats))
            }
            AdminCommand::Users {
                skip,
                limit,
                role,
                active,
            } => {
                let filter = UserFilter {
                    skip,
                    limit,
                    role,
                    is_active: active,
                };
                let users = ledger.list_users(&token, &filter).await.map_err(ledger_err)?;
                self.out.show(&users, || {
                    if users.is_empty() {
                        "No users match.".to_string()
                    } else {
                        users.iter().map(render::user_line).collect::<Vec<_>>().join("\n")
                    }
                })
            }
            AdminCommand::User { id } => {
                let id = UserId(id);
                let user = ledger
                    .get_user(&token, &id)
                    .await
                    .map_err(ledger_err)?
                    .ok_or_else(|| anyhow!("user {id} not found"))?;
                let stats = ledger.user_detail_stats(&token, &id).await.map_err(ledger_err)?;
                let value = serde_json::json!({ "user": user, "stats": stats });
                self.out
                    .show(&value, || render::user_detail_text(&user, &stats))
            }
            AdminCommand::Update {
                id,
                active,
                premium,
                role,
            } => {
                let update = AdminUserUpdate {
                    is_active: active,
                    is_premium: premium,
                    role,
                };
                if update.is_empty() {
                    bail!("nothing to update: pass --active, --premium or --role");
                }
                let user = ledger
                    .update_user(&token, &UserId(id), &update)
                    .await
                    .map_err(ledger_err)?;
                self.out.show(&user, || render::user_line(&user))
            }
            AdminCommand::Disable { id } => {
                let id = UserId(id);
                self.refuse_self(&id)?;
                ledger.disable_user(&token, &id).await.map_err(ledger_err)?;
                self.out.notice(&format!("User {id} disabled."))
            }
            AdminCommand::Enable { id } => {
                let id = UserId(id);
                ledger.enable_user(&token, &id).await.map_err(ledger_err)?;
                self.out.notice(&format!("User {id} enabled."))
            }
        }
    }

    /// Admins cannot lock themselves out.
    fn refuse_self(&self, id: &UserId) -> Result<()> {
        if self.user()?.id == *id {
            bail!("you cannot disable your own account");
        }
        Ok(())
    }
}

fn ledger_err(e: LedgerError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn password_or_stdin(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    eprint!("Password: ");
    let line = std::io::stdin()
        .lock()
        .lines()
        .next()
        .transpose()
        .context("failed to read password from stdin")?
        .unwrap_or_default();
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
