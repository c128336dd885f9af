use super::{ServiceContext, decode, report_load_failure};
use crate::chain::RecordId;
use crate::error::{ServiceError, StoreError};
use crate::notify::Notification;
use crate::store::{
    EntityKind, FieldReader, Fields, Record, RecordFilter, SortOrder, StoredEntity, json_field,
    timestamp_field,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SUPPORTED_MODELS: [(&str, &str, &str); 6] = [
    ("gpt-4-turbo-preview", "GPT-4 Turbo", "OpenAI"),
    ("gpt-3.5-turbo", "GPT-3.5 Turbo", "OpenAI"),
    ("claude-3-opus", "Claude 3 Opus", "Anthropic"),
    ("claude-3-sonnet", "Claude 3 Sonnet", "Anthropic"),
    ("gemini-pro", "Gemini Pro", "Google"),
    ("mistral-large", "Mistral Large", "Mistral"),
];

const BILLING_PERIOD_DAYS: i64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailNotifications {
    pub chain_executions: bool,
    pub weekly_reports: bool,
    pub system_updates: bool,
}

impl Default for EmailNotifications {
    fn default() -> Self {
        Self {
            chain_executions: true,
            weekly_reports: false,
            system_updates: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub snap_to_grid: bool,
    pub show_minimap: bool,
    pub auto_layout: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            snap_to_grid: true,
            show_minimap: false,
            auto_layout: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultSettings {
    pub theme: String,
    pub auto_save: bool,
    pub show_tutorials: bool,
    pub email_notifications: EmailNotifications,
    pub editor_settings: EditorSettings,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            auto_save: true,
            show_tutorials: true,
            email_notifications: EmailNotifications::default(),
            editor_settings: EditorSettings::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    pub plan: String,
    pub executions_used: u32,
    pub execution_limit: u32,
    pub reset_date: Option<DateTime<Utc>>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            plan: "free".to_string(),
            executions_used: 0,
            execution_limit: 100,
            reset_date: None,
        }
    }
}

impl Subscription {
    pub fn remaining(&self) -> u32 {
        self.execution_limit.saturating_sub(self.executions_used)
    }
}

/// The single per-user settings record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub id: Option<RecordId>,
    pub name: String,
    pub encrypted_api_key: String,
    pub preferred_model: String,
    pub default_settings: DefaultSettings,
    pub subscription: Subscription,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserSettings {
    /// What a user who never saved anything sees. The billing period starts at `now`.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: "User Settings".to_string(),
            encrypted_api_key: String::new(),
            preferred_model: crate::config::DEFAULT_MODEL.to_string(),
            default_settings: DefaultSettings::default(),
            subscription: Subscription {
                reset_date: Some(now + Duration::days(BILLING_PERIOD_DAYS)),
                ..Subscription::default()
            },
            created_at: None,
            updated_at: None,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.encrypted_api_key.trim().is_empty()
    }

    /// The stored key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.encrypted_api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }

    fn apply(&mut self, update: SettingsUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(key) = update.encrypted_api_key {
            self.encrypted_api_key = key;
        }
        if let Some(model) = update.preferred_model {
            self.preferred_model = model;
        }
        if let Some(settings) = update.default_settings {
            self.default_settings = settings;
        }
        if let Some(subscription) = update.subscription {
            self.subscription = subscription;
        }
    }
}

impl StoredEntity for UserSettings {
    const KIND: EntityKind = EntityKind::UserSetting;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Name".into(), self.name.as_str().into());
        fields.insert("encrypted_api_key".into(), self.encrypted_api_key.as_str().into());
        fields.insert("preferred_model".into(), self.preferred_model.as_str().into());
        fields.insert("default_settings".into(), json_field(&self.default_settings));
        fields.insert("subscription".into(), json_field(&self.subscription));
        fields.insert("created_at".into(), timestamp_field(self.created_at));
        fields.insert("updated_at".into(), timestamp_field(self.updated_at));
        fields
    }

    fn from_record(record: &Record) -> Result<Self, StoreError> {
        let r = FieldReader::new(Self::KIND, record);
        let preferred_model = r
            .opt_text("preferred_model")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| crate::config::DEFAULT_MODEL.to_string());
        Ok(UserSettings {
            id: Some(record.id),
            name: r.text("Name"),
            encrypted_api_key: r.text("encrypted_api_key"),
            preferred_model,
            default_settings: r.json("default_settings")?,
            subscription: r.json("subscription")?,
            created_at: r.timestamp("created_at"),
            updated_at: r.timestamp("updated_at"),
        })
    }
}

/// A partial settings change. `None` leaves the stored value alone.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub name: Option<String>,
    pub encrypted_api_key: Option<String>,
    pub preferred_model: Option<String>,
    pub default_settings: Option<DefaultSettings>,
    pub subscription: Option<Subscription>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyValidation {
    pub valid: bool,
    pub models: Vec<String>,
}

pub struct SettingsService {
    ctx: ServiceContext,
}

impl SettingsService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The stored settings, or the defaults when nothing is stored or the store is unreachable.
    ///
    /// An unreadable record yields the defaults under that record's id, so the next
    /// [`update`](Self::update) overwrites it instead of creating another one.
    pub async fn get(&self) -> UserSettings {
        let filter = RecordFilter::new()
            .order_by("created_at", SortOrder::Asc)
            .limit(1);
        match self.ctx.store.list(EntityKind::UserSetting, &filter).await {
            Ok(records) => match records.first() {
                Some(record) => UserSettings::from_record(record).unwrap_or_else(|e| {
                    tracing::warn!(id = record.id, error = %e, "Stored settings are unreadable, using defaults");
                    self.ctx
                        .notify(Notification::error("Stored settings could not be read, showing defaults"));
                    UserSettings {
                        id: Some(record.id),
                        ..UserSettings::defaults(Utc::now())
                    }
                }),
                None => UserSettings::defaults(Utc::now()),
            },
            Err(e) => {
                report_load_failure(&self.ctx, "settings", &e);
                UserSettings::defaults(Utc::now())
            }
        }
    }

    /// Merges `update` into the current settings, creating the record on first save.
    pub async fn update(&self, update: SettingsUpdate) -> Result<UserSettings, ServiceError> {
        let mut settings = self.get().await;
        settings.apply(update);
        let now = Utc::now();
        settings.updated_at = Some(now);

        let record = match settings.id {
            Some(id) => {
                let mut fields = settings.to_fields();
                fields.remove("created_at");
                let outcome = self.ctx.store.update(EntityKind::UserSetting, id, fields).await?;
                self.ctx.written(EntityKind::UserSetting, "update", outcome)?
            }
            None => {
                settings.created_at = Some(now);
                let outcome = self
                    .ctx
                    .store
                    .create(EntityKind::UserSetting, settings.to_fields())
                    .await?;
                self.ctx.written(EntityKind::UserSetting, "create", outcome)?
            }
        };
        tracing::info!(id = record.id, "Settings saved");
        decode(&record)
    }

    pub async fn update_api_key(&self, api_key: &str) -> Result<UserSettings, ServiceError> {
        self.update(SettingsUpdate {
            encrypted_api_key: Some(api_key.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Format-only check: keys longer than the configured minimum are accepted.
    pub fn validate_api_key(&self, api_key: &str) -> ApiKeyValidation {
        let valid = api_key.chars().count() > self.ctx.config.api_key_min_length;
        ApiKeyValidation {
            valid,
            models: if valid {
                SUPPORTED_MODELS.iter().map(|(id, _, _)| id.to_string()).collect()
            } else {
                Vec::new()
            },
        }
    }

    pub fn available_models(&self) -> Vec<ModelInfo> {
        SUPPORTED_MODELS
            .iter()
            .map(|&(id, name, provider)| ModelInfo { id, name, provider })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    #[test]
    fn masking_keeps_the_last_four_characters() {
        let mut settings = UserSettings::defaults(Utc::now());
        settings.encrypted_api_key = "sk-or-abcdef1234".to_string();
        assert_eq!(settings.masked_api_key(), "************1234");
        settings.encrypted_api_key = "abc".to_string();
        assert_eq!(settings.masked_api_key(), "***");
    }

    #[test]
    fn key_validation_is_a_length_check() {
        let service = SettingsService::new(ServiceContext::new(Arc::new(InMemoryStore::new())));
        let short = service.validate_api_key("0123456789");
        assert!(!short.valid);
        assert!(short.models.is_empty());

        let long = service.validate_api_key("0123456789a");
        assert!(long.valid);
        assert_eq!(long.models.len(), 6);
        assert_eq!(long.models[0], "gpt-4-turbo-preview");
    }

    #[test]
    fn sparse_records_decode_with_defaults() {
        let mut fields = Fields::new();
        fields.insert("encrypted_api_key".into(), "key".into());
        let settings = UserSettings::from_record(&Record { id: 1, fields }).unwrap();
        assert_eq!(settings.preferred_model, "gpt-4-turbo-preview");
        assert_eq!(settings.default_settings, DefaultSettings::default());
        assert_eq!(settings.subscription.execution_limit, 100);
    }
}
