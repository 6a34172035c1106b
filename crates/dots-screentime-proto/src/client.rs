use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use dots_screentime_common::config::ControlConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::dto::*;
use crate::envelope::{IpcRequest, IpcResponse};
use crate::error::{ClientError, ProtocolError};
use crate::frame::{read_message, write_message};

/// Client for the daemon's control socket.
///
/// Every call opens a fresh connection. Timeouts and transport failures
/// are retried with a linearly growing delay; protocol and daemon errors
/// are returned at once.
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    max_frame_bytes: usize,
}

impl ControlClient {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            socket_path: PathBuf::from(&config.socket_path),
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Send a request, retrying transient failures.
    pub async fn send(&self, request: &IpcRequest) -> Result<IpcResponse, ClientError> {
        let mut attempt = 1;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        request.action, attempt, self.max_retries, e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(ClientError::RetriesExhausted { attempts: attempt, last: Box::new(e) })
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &IpcRequest) -> Result<IpcResponse, ClientError> {
        let exchange = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            write_message(&mut stream, request, self.max_frame_bytes).await?;
            let response: IpcResponse = read_message(&mut stream, self.max_frame_bytes).await?;
            Ok::<_, ClientError>(response)
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout.as_millis() as u64))??;

        if response.request_id != request.request_id {
            return Err(ProtocolError::RequestIdMismatch {
                expected: request.request_id.clone(),
                got: response.request_id,
            }
            .into());
        }
        debug!("{} answered, success={}", request.action, response.success);
        Ok(response)
    }

    /// Send `action` with `payload` and decode the reply data.
    pub async fn call<P, T>(&self, action: Action, payload: &P) -> Result<T, ClientError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = IpcRequest::new(action, payload).map_err(ProtocolError::Json)?;
        let response = self.send(&request).await?;
        if !response.success {
            return Err(ClientError::Server(response.error_message));
        }
        response.data().map_err(|e| ProtocolError::Json(e).into())
    }

    async fn call_empty<T: DeserializeOwned>(&self, action: Action) -> Result<T, ClientError> {
        self.call(action, &serde_json::json!({})).await
    }

    pub async fn ping(&self) -> Result<PingResponse, ClientError> {
        self.call_empty(Action::Ping).await
    }

    pub async fn today_summary(&self) -> Result<UsageSummaryResponse, ClientError> {
        self.call_empty(Action::GetTodaySummary).await
    }

    pub async fn usage_by_date(&self, date_local: NaiveDate) -> Result<UsageSummaryResponse, ClientError> {
        self.call(Action::GetUsageByDate, &UsageByDateRequest { date_local }).await
    }

    pub async fn weekly_summary(
        &self,
        week_start_date: Option<NaiveDate>,
    ) -> Result<WeeklySummaryResponse, ClientError> {
        self.call(Action::GetWeeklySummary, &WeeklySummaryRequest { week_start_date }).await
    }

    pub async fn app_details(&self, app_id: Uuid) -> Result<AppDetailsResponse, ClientError> {
        self.call(Action::GetAppDetails, &AppDetailsRequest { app_id }).await
    }

    pub async fn recent_sessions(
        &self,
        app_id: Option<Uuid>,
        max_count: u32,
    ) -> Result<Vec<SessionDto>, ClientError> {
        self.call(Action::GetRecentSessions, &RecentSessionsRequest { app_id, max_count }).await
    }

    pub async fn limit_rules(&self) -> Result<Vec<LimitRuleDto>, ClientError> {
        self.call_empty(Action::GetLimitRules).await
    }

    pub async fn upsert_limit_rule(&self, rule: &LimitRuleDto) -> Result<(), ClientError> {
        self.call(Action::UpsertLimitRule, rule).await
    }

    pub async fn add_extra_time(&self, app_id: Uuid, extra_minutes: i64) -> Result<(), ClientError> {
        self.call(Action::AddExtraTime, &AddExtraTimeRequest { app_id, extra_minutes }).await
    }

    pub async fn start_focus(&self, request: &StartFocusRequest) -> Result<(), ClientError> {
        self.call(Action::StartFocus, request).await
    }

    pub async fn stop_focus(&self) -> Result<(), ClientError> {
        self.call_empty(Action::StopFocus).await
    }

    pub async fn focus_status(&self) -> Result<FocusStatusResponse, ClientError> {
        self.call_empty(Action::GetFocusStatus).await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.call_empty(Action::GetNotifications).await
    }

    pub async fn export_data(&self, format: ExportFormat) -> Result<ExportResponse, ClientError> {
        self.call(Action::ExportData, &ExportRequest { format }).await
    }

    pub async fn clear_data(&self) -> Result<(), ClientError> {
        self.call_empty(Action::ClearData).await
    }

    pub async fn verify_pin(&self, pin: &str) -> Result<bool, ClientError> {
        self.call(Action::VerifyPin, &PinRequest { pin: pin.to_string() }).await
    }

    pub async fn set_pin(&self, old_pin: &str, new_pin: &str) -> Result<bool, ClientError> {
        let request = SetPinRequest { old_pin: old_pin.to_string(), new_pin: new_pin.to_string() };
        self.call(Action::SetPin, &request).await
    }
}
