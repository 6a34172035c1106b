use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use dots_screentime_common::{LimitRule, Notification};
use dots_screentime_db::queries::{AppQueries, RuleQueries};
use dots_screentime_db::Database;
use dots_screentime_proto::dto::*;
use dots_screentime_proto::{Action, IpcRequest, IpcResponse, PROTOCOL_VERSION};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::export;
use crate::focus::FocusManager;
use crate::limits::{dto_to_rule, rule_to_dto, LimitEvaluator};
use crate::notifications::NotificationQueue;
use crate::pin::PinService;

/// Everything a control client can ask of the daemon.
///
/// Each operation is a plain async method so tests and the socket server
/// share one code path; `handle` maps wire requests onto them.
pub struct ScreenTime {
    db: Database,
    aggregator: Arc<Aggregator>,
    limits: Arc<LimitEvaluator>,
    focus: FocusManager,
    notifications: NotificationQueue,
    pins: PinService,
    export_dir: PathBuf,
    started_at: Instant,
}

impl ScreenTime {
    pub fn new(
        db: Database,
        aggregator: Arc<Aggregator>,
        limits: Arc<LimitEvaluator>,
        focus: FocusManager,
        notifications: NotificationQueue,
        export_dir: PathBuf,
    ) -> Self {
        let pins = PinService::new(db.clone());
        Self {
            db,
            aggregator,
            limits,
            focus,
            notifications,
            pins,
            export_dir,
            started_at: Instant::now(),
        }
    }

    pub fn ping(&self) -> PingResponse {
        PingResponse {
            running: true,
            version: PROTOCOL_VERSION.to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    pub async fn today_summary(&self) -> Result<UsageSummaryResponse> {
        let now = Utc::now();
        let today = self.aggregator.zone().local_date(now);
        self.aggregator.summary(today, now).await
    }

    pub async fn usage_by_date(&self, request: UsageByDateRequest) -> Result<UsageSummaryResponse> {
        self.aggregator.summary(request.date_local, Utc::now()).await
    }

    pub async fn weekly_summary(&self, request: WeeklySummaryRequest) -> Result<WeeklySummaryResponse> {
        self.aggregator.weekly_summary(request.week_start_date, Utc::now()).await
    }

    pub async fn app_details(&self, request: AppDetailsRequest) -> Result<AppDetailsResponse> {
        self.aggregator.app_details(request.app_id, Utc::now()).await
    }

    pub async fn recent_sessions(&self, request: RecentSessionsRequest) -> Result<Vec<SessionDto>> {
        self.aggregator.recent_sessions(request.app_id, request.max_count, Utc::now()).await
    }

    /// Every known app, with its stored rule or an empty disabled one.
    pub async fn limit_rules(&self) -> Result<Vec<LimitRuleDto>> {
        let mut rules = Vec::new();
        for app in AppQueries::list_all(&self.db).await? {
            let rule = match RuleQueries::get_for_app(&self.db, &app.id).await? {
                Some(row) => LimitRule::try_from(row)?,
                None => {
                    let app_id = Uuid::parse_str(&app.id)
                        .with_context(|| format!("Invalid app id: {}", app.id))?;
                    LimitRule { enabled: false, ..LimitRule::new(app_id) }
                }
            };
            rules.push(rule_to_dto(&rule, &app.process_name, &app.display_name));
        }
        Ok(rules)
    }

    pub async fn upsert_limit_rule(&self, dto: LimitRuleDto) -> Result<()> {
        let rule = dto_to_rule(&dto)?;
        let app = AppQueries::get_by_id(&self.db, &rule.app_id.to_string())
            .await
            .with_context(|| format!("Unknown app: {}", rule.app_id))?;

        RuleQueries::upsert(&self.db, &rule).await.context("Failed to store limit rule")?;
        let loaded = self.limits.reload_rules(&self.db).await?;
        info!(
            "Limit rule for {} saved ({} enabled rules loaded)",
            app.process_name, loaded
        );
        Ok(())
    }

    pub async fn add_extra_time(&self, request: AddExtraTimeRequest) -> Result<()> {
        anyhow::ensure!(request.extra_minutes > 0, "Extra time must be positive");
        let app = AppQueries::get_by_id(&self.db, &request.app_id.to_string())
            .await
            .with_context(|| format!("Unknown app: {}", request.app_id))?;

        let total = self.limits.grant_extension(&app.process_name, request.extra_minutes);
        info!(
            "Granted {} extra minutes to {} ({} today)",
            request.extra_minutes, app.process_name, total
        );
        Ok(())
    }

    pub async fn start_focus(&self, request: StartFocusRequest) -> Result<()> {
        self.focus.start(request, Utc::now()).await?;
        Ok(())
    }

    pub async fn stop_focus(&self) -> Result<()> {
        self.focus.stop(Utc::now()).await?;
        Ok(())
    }

    pub fn focus_status(&self) -> FocusStatusResponse {
        self.focus.status(Utc::now())
    }

    /// Pending notifications, oldest first. Reading empties the queue.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.drain()
    }

    pub async fn export_data(&self, request: ExportRequest) -> Result<ExportResponse> {
        let now = Utc::now();
        let local_now = self.aggregator.zone().local_datetime(now);
        let path =
            export::export_data(&self.db, request.format, &self.export_dir, now, local_now).await?;
        Ok(ExportResponse { path: path.to_string_lossy().to_string() })
    }

    pub async fn clear_data(&self) -> Result<()> {
        self.aggregator.clear_history(Utc::now()).await
    }

    pub async fn verify_pin(&self, request: PinRequest) -> Result<bool> {
        self.pins.verify(&SecretString::from(request.pin)).await
    }

    pub async fn set_pin(&self, request: SetPinRequest) -> Result<bool> {
        self.pins
            .set(&SecretString::from(request.old_pin), &SecretString::from(request.new_pin))
            .await
    }

    /// Answer one control request. Never fails: errors become an
    /// unsuccessful response carrying the message.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        let action = request.action();
        if action == Action::Unknown {
            warn!("Unknown action: {}", request.action);
            return IpcResponse::failure(request.request_id, "Unknown action");
        }

        debug!("Handling {} ({})", request.action, request.request_id);
        match self.dispatch(action, &request).await {
            Ok(None) => IpcResponse::ok(request.request_id),
            Ok(Some(data_json)) => IpcResponse { data_json, ..IpcResponse::ok(request.request_id) },
            Err(e) => {
                warn!("{} failed: {:#}", request.action, e);
                IpcResponse::failure(request.request_id, format!("{:#}", e))
            }
        }
    }

    async fn dispatch(&self, action: Action, request: &IpcRequest) -> Result<Option<String>> {
        match action {
            Action::Ping => encode(&self.ping()),
            Action::GetTodaySummary => encode(&self.today_summary().await?),
            Action::GetUsageByDate => encode(&self.usage_by_date(decode(request)?).await?),
            Action::GetWeeklySummary => encode(&self.weekly_summary(decode(request)?).await?),
            Action::GetAppDetails => encode(&self.app_details(decode(request)?).await?),
            Action::GetRecentSessions => encode(&self.recent_sessions(decode(request)?).await?),
            Action::GetLimitRules => encode(&self.limit_rules().await?),
            Action::UpsertLimitRule => {
                self.upsert_limit_rule(decode(request)?).await?;
                Ok(None)
            }
            Action::AddExtraTime => {
                self.add_extra_time(decode(request)?).await?;
                Ok(None)
            }
            Action::StartFocus => {
                self.start_focus(decode(request)?).await?;
                Ok(None)
            }
            Action::StopFocus => {
                self.stop_focus().await?;
                Ok(None)
            }
            Action::GetFocusStatus => encode(&self.focus_status()),
            Action::GetNotifications => encode(&self.notifications()),
            Action::ExportData => encode(&self.export_data(decode(request)?).await?),
            Action::ClearData => {
                self.clear_data().await?;
                Ok(None)
            }
            Action::VerifyPin => encode(&self.verify_pin(decode(request)?).await?),
            Action::SetPin => encode(&self.set_pin(decode(request)?).await?),
            Action::Unknown => anyhow::bail!("Unknown action"),
        }
    }
}

fn decode<T: DeserializeOwned>(request: &IpcRequest) -> Result<T> {
    request.payload().with_context(|| format!("Invalid payload for {}", request.action))
}

fn encode<T: Serialize>(data: &T) -> Result<Option<String>> {
    let json = serde_json::to_string(data).context("Failed to encode response")?;
    Ok(Some(json))
}
