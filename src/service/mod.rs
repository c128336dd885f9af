//! Services over the record store.
//!
//! Each service owns a [`ServiceContext`]: the injected store, the notifier that stands in
//! for UI toasts, and the runtime configuration. Nothing here is a global.
//!
//! Reads that back a list view never fail: they notify and fall back to an empty or default
//! value. Single-record reads and every write return a [`Result`](crate::error::ServiceError).

use crate::config::Config;
use crate::error::{ServiceError, StoreError};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::store::{EntityKind, Record, RecordFailure, RecordStore, StoredEntity};
use std::sync::Arc;
use std::time::Duration;

mod analytics;
mod chains;
mod settings;
mod templates;

pub use analytics::{
    Activity, AnalyticsService, AnalyticsSnapshot, ChainPerformance, HealthBadge, ModelUsage,
    MonthSummary, Overview, UsagePeriod, UsageStat,
};
pub use chains::ChainService;
pub use settings::{
    ApiKeyValidation, DefaultSettings, EditorSettings, EmailNotifications, ModelInfo,
    SettingsService, SettingsUpdate, Subscription, UserSettings,
};
pub use templates::TemplateService;

/// Shared dependencies of every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            notifier: Arc::new(TracingNotifier),
            config: Config::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// One error notification per field error and per record message of a failed write.
    pub(crate) fn report_failures<'a>(
        &self,
        kind: EntityKind,
        action: &str,
        failures: impl IntoIterator<Item = &'a RecordFailure>,
    ) {
        for failure in failures {
            tracing::error!(%kind, id = ?failure.id, action, errors = ?failure.messages(), "Record write failed");
            for message in failure.messages() {
                self.notify(Notification::error(message));
            }
        }
    }

    /// Unwraps a single-record write, reporting the failure if there was one.
    pub(crate) fn written(
        &self,
        kind: EntityKind,
        action: &str,
        outcome: Result<Record, RecordFailure>,
    ) -> Result<Record, ServiceError> {
        outcome.map_err(|failure| {
            self.report_failures(kind, action, [&failure]);
            let summary = failure.messages().join("; ");
            ServiceError::WriteFailed(if summary.is_empty() {
                format!("Failed to {action} {kind}")
            } else {
                summary
            })
        })
    }
}

/// Decodes every record. Unreadable ones are skipped and the user is told about each.
pub(crate) fn decode_all<E: StoredEntity>(ctx: &ServiceContext, records: &[Record]) -> Vec<E> {
    records
        .iter()
        .filter_map(|record| match E::from_record(record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(kind = %E::KIND, id = record.id, error = %e, "Skipping unreadable record");
                ctx.notify(Notification::error(format!(
                    "Could not read {} record {}: {e}",
                    E::KIND,
                    record.id
                )));
                None
            }
        })
        .collect()
}

pub(crate) fn decode<E: StoredEntity>(record: &Record) -> Result<E, ServiceError> {
    E::from_record(record).map_err(ServiceError::from)
}

/// Logs a failed list read and tells the user about it.
pub(crate) fn report_load_failure(ctx: &ServiceContext, what: &str, error: &StoreError) {
    tracing::error!(error = %error, "Failed to load {}", what);
    ctx.notify(Notification::error(format!("Failed to load {what}")));
}

pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
