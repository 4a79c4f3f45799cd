pub mod conflicts;
pub mod settings;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{error, warn};

use crate::error::{AppError, AppResult};
use crate::services::http_gateway::HttpTimetableGateway;
use crate::services::repair_service::RepairService;
use crate::services::settings_service::SettingsService;
use crate::services::timetable_gateway::TimetableGateway;
use crate::utils::cancellation::CancellationToken;

/// Shared handles behind every command. At most one auto-fix run is in
/// flight per state.
#[derive(Clone)]
pub struct AppState {
    settings_service: Arc<SettingsService>,
    repair_service: Arc<RepairService>,
    active_run: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    /// Talks to the configured REST backend.
    pub fn new(settings_service: Arc<SettingsService>) -> AppResult<Self> {
        let settings = settings_service.get()?;
        let gateway: Arc<dyn TimetableGateway> =
            Arc::new(HttpTimetableGateway::from_settings(&settings)?);
        Self::with_gateway(settings_service, gateway)
    }

    pub fn with_gateway(
        settings_service: Arc<SettingsService>,
        gateway: Arc<dyn TimetableGateway>,
    ) -> AppResult<Self> {
        let settings = settings_service.get()?;
        let repair_service = Arc::new(RepairService::new(gateway, settings));
        Ok(Self {
            settings_service,
            repair_service,
            active_run: Arc::new(Mutex::new(None)),
        })
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }

    pub fn repair(&self) -> Arc<RepairService> {
        Arc::clone(&self.repair_service)
    }

    /// Claims the run slot. Dropping the guard releases it.
    pub fn begin_run(&self) -> CommandResult<RunGuard> {
        let mut active = self
            .active_run
            .lock()
            .map_err(|_| CommandError::new("UNKNOWN", "run state lock poisoned", None))?;
        if active.is_some() {
            warn!(target: "app::command", "auto-fix requested while another run is active");
            return Err(CommandError::new(
                "RUN_IN_PROGRESS",
                "an auto-fix run is already in progress",
                None,
            ));
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok(RunGuard {
            active_run: Arc::clone(&self.active_run),
            token,
        })
    }

    /// Returns `false` when nothing was running.
    pub fn cancel_run(&self) -> bool {
        match self.active_run.lock() {
            Ok(active) => match active.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

pub struct RunGuard {
    active_run: Arc<Mutex<Option<CancellationToken>>>,
    token: CancellationToken,
}

impl RunGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active_run.lock() {
            *active = None;
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }

    fn with_detail(mut self, key: &str, value: JsonValue) -> Self {
        let mut merged = match self.details.take() {
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                let mut map = JsonMap::new();
                map.insert("info".to_string(), other);
                map
            }
            None => JsonMap::new(),
        };
        merged.insert(key.to_string(), value);
        self.details = Some(JsonValue::Object(merged));
        self
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::Store {
                code,
                message,
                correlation_id,
                details,
            } => {
                let command_error = CommandError::new(code.as_str(), message, details);
                match correlation_id {
                    Some(id) => command_error.with_detail("correlationId", JsonValue::String(id)),
                    None => command_error,
                }
            }
            AppError::ResolutionAborted {
                attempts_used,
                source,
            } => CommandError::from(*source).with_detail("attemptsUsed", attempts_used.into()),
            AppError::Config(message) => {
                error!(target: "app::command", %message, "configuration error in command");
                CommandError::new("CONFIG_ERROR", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "failed to encode or decode data", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "file system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}
