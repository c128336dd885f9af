use super::{ServiceContext, decode, decode_all, report_load_failure};
use crate::chain::RecordId;
use crate::error::{ServiceError, StoreError};
use crate::store::{
    EntityKind, FieldReader, Fields, Record, RecordFilter, SortOrder, StoredEntity, json_field,
    timestamp_field,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthSummary {
    pub executions: u64,
    /// Percentage change against the previous month.
    pub growth: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Overview {
    pub total_chains: u64,
    pub total_executions: u64,
    pub success_rate: f64,
    /// Seconds.
    pub avg_response_time: f64,
    pub this_month: MonthSummary,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UsageStat {
    pub date: NaiveDate,
    pub executions: u64,
    pub success: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainPerformance {
    #[serde(rename = "Id")]
    pub id: RecordId,
    pub name: String,
    pub executions: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
}

impl ChainPerformance {
    pub fn health(&self) -> HealthBadge {
        HealthBadge::for_success_rate(self.success_rate)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelUsage {
    pub model: String,
    pub executions: u64,
    pub percentage: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "Id")]
    pub id: RecordId,
    pub chain_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How healthy a success rate looks on the dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthBadge {
    Success,
    Warning,
    Error,
}

impl HealthBadge {
    /// Above 95% is healthy, above 90% needs attention, anything else is failing.
    pub fn for_success_rate(rate: f64) -> Self {
        if rate > 95.0 {
            HealthBadge::Success
        } else if rate > 90.0 {
            HealthBadge::Warning
        } else {
            HealthBadge::Error
        }
    }
}

/// The windows the usage chart can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsagePeriod {
    #[default]
    Week,
    Month,
    Quarter,
}

impl UsagePeriod {
    pub fn key(self) -> &'static str {
        match self {
            UsagePeriod::Week => "7d",
            UsagePeriod::Month => "30d",
            UsagePeriod::Quarter => "90d",
        }
    }
}

impl fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for UsagePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(UsagePeriod::Week),
            "30d" => Ok(UsagePeriod::Month),
            "90d" => Ok(UsagePeriod::Quarter),
            other => Err(format!("Unknown usage period '{other}', expected 7d, 30d or 90d")),
        }
    }
}

/// Dashboard figures captured at one point in time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub id: Option<RecordId>,
    pub captured_at: Option<DateTime<Utc>>,
    pub overview: Overview,
    /// Keyed by [`UsagePeriod::key`].
    pub usage_stats: BTreeMap<String, Vec<UsageStat>>,
    pub chain_performance: Vec<ChainPerformance>,
    pub model_usage: Vec<ModelUsage>,
    pub recent_activity: Vec<Activity>,
}

impl AnalyticsSnapshot {
    pub fn usage(&self, period: UsagePeriod) -> &[UsageStat] {
        self.usage_stats
            .get(period.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl StoredEntity for AnalyticsSnapshot {
    const KIND: EntityKind = EntityKind::AnalyticsSnapshot;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("captured_at".into(), timestamp_field(self.captured_at));
        fields.insert("overview".into(), json_field(&self.overview));
        fields.insert("usage_stats".into(), json_field(&self.usage_stats));
        fields.insert("chain_performance".into(), json_field(&self.chain_performance));
        fields.insert("model_usage".into(), json_field(&self.model_usage));
        fields.insert("recent_activity".into(), json_field(&self.recent_activity));
        fields
    }

    fn from_record(record: &Record) -> Result<Self, StoreError> {
        let r = FieldReader::new(Self::KIND, record);
        Ok(AnalyticsSnapshot {
            id: Some(record.id),
            captured_at: r.timestamp("captured_at"),
            overview: r.json("overview")?,
            usage_stats: r.json("usage_stats")?,
            chain_performance: r.json("chain_performance")?,
            model_usage: r.json("model_usage")?,
            recent_activity: r.json("recent_activity")?,
        })
    }
}

/// Read-only dashboard queries over the latest analytics snapshot.
pub struct AnalyticsService {
    ctx: ServiceContext,
}

impl AnalyticsService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The most recently captured snapshot, if any could be loaded.
    pub async fn latest(&self) -> Option<AnalyticsSnapshot> {
        let filter = RecordFilter::new()
            .order_by("captured_at", SortOrder::Desc)
            .limit(1);
        match self.ctx.store.list(EntityKind::AnalyticsSnapshot, &filter).await {
            Ok(records) => decode_all(&self.ctx, &records).into_iter().next(),
            Err(e) => {
                report_load_failure(&self.ctx, "analytics", &e);
                None
            }
        }
    }

    pub async fn overview(&self) -> Overview {
        self.latest().await.map(|s| s.overview).unwrap_or_default()
    }

    pub async fn usage_stats(&self, period: UsagePeriod) -> Vec<UsageStat> {
        self.latest()
            .await
            .and_then(|mut s| s.usage_stats.remove(period.key()))
            .unwrap_or_default()
    }

    pub async fn chain_performance(&self) -> Vec<ChainPerformance> {
        self.latest()
            .await
            .map(|s| s.chain_performance)
            .unwrap_or_default()
    }

    pub async fn model_usage(&self) -> Vec<ModelUsage> {
        self.latest().await.map(|s| s.model_usage).unwrap_or_default()
    }

    /// Newest first.
    pub async fn recent_activity(&self) -> Vec<Activity> {
        let mut activity = self
            .latest()
            .await
            .map(|s| s.recent_activity)
            .unwrap_or_default();
        activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        activity
    }

    pub async fn record_snapshot(
        &self,
        mut snapshot: AnalyticsSnapshot,
    ) -> Result<AnalyticsSnapshot, ServiceError> {
        if snapshot.captured_at.is_none() {
            snapshot.captured_at = Some(Utc::now());
        }
        let outcome = self
            .ctx
            .store
            .create(EntityKind::AnalyticsSnapshot, snapshot.to_fields())
            .await?;
        let record = self
            .ctx
            .written(EntityKind::AnalyticsSnapshot, "create", outcome)?;
        tracing::info!(id = record.id, "Analytics snapshot recorded");
        decode(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badges_follow_the_dashboard_thresholds() {
        assert_eq!(HealthBadge::for_success_rate(98.5), HealthBadge::Success);
        assert_eq!(HealthBadge::for_success_rate(95.0), HealthBadge::Warning);
        assert_eq!(HealthBadge::for_success_rate(92.1), HealthBadge::Warning);
        assert_eq!(HealthBadge::for_success_rate(90.0), HealthBadge::Error);
    }

    #[test]
    fn periods_parse_from_their_keys() {
        assert_eq!("30d".parse::<UsagePeriod>(), Ok(UsagePeriod::Month));
        assert_eq!(UsagePeriod::Quarter.to_string(), "90d");
        assert!("1y".parse::<UsagePeriod>().is_err());
    }

    #[test]
    fn activity_uses_the_dashboard_field_names() {
        let activity = Activity {
            id: 1,
            chain_name: "Blog Writer".to_string(),
            kind: "execution".to_string(),
            status: "success".to_string(),
            model: Some("gpt-4-turbo-preview".to_string()),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["Id"], 1);
        assert_eq!(json["chainName"], "Blog Writer");
        assert_eq!(json["type"], "execution");
    }
}
