use super::{ServiceContext, decode, decode_all, report_load_failure};
use crate::chain::{self, Chain, IntoChain, RecordId, Template};
use crate::error::ServiceError;
use crate::notify::Notification;
use crate::store::{EntityKind, RecordFilter, SortOrder, StoredEntity};
use chrono::Utc;

/// The template library.
pub struct TemplateService {
    ctx: ServiceContext,
}

impl TemplateService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Every template in creation order. Failures are notified and yield an empty list.
    pub async fn list(&self) -> Vec<Template> {
        let filter = RecordFilter::new().order_by("created_at", SortOrder::Asc);
        match self.ctx.store.list(EntityKind::Template, &filter).await {
            Ok(records) => decode_all(&self.ctx, &records),
            Err(e) => {
                report_load_failure(&self.ctx, "templates", &e);
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: RecordId) -> Result<Template, ServiceError> {
        let record = self.ctx.store.get_by_id(EntityKind::Template, id).await?;
        decode(&record)
    }

    pub async fn create(&self, mut template: Template) -> Result<Template, ServiceError> {
        let now = Utc::now();
        template.created_at = Some(now);
        template.updated_at = Some(now);

        let outcome = self
            .ctx
            .store
            .create(EntityKind::Template, template.to_fields())
            .await?;
        let record = self.ctx.written(EntityKind::Template, "create", outcome)?;
        tracing::info!(id = record.id, name = %template.name, "Template created");
        decode(&record)
    }

    pub async fn update(&self, id: RecordId, mut template: Template) -> Result<Template, ServiceError> {
        self.ctx.store.get_by_id(EntityKind::Template, id).await?;
        template.updated_at = Some(Utc::now());
        let mut fields = template.to_fields();
        fields.remove("created_at");

        let outcome = self.ctx.store.update(EntityKind::Template, id, fields).await?;
        let record = self.ctx.written(EntityKind::Template, "update", outcome)?;
        tracing::info!(id, "Template updated");
        decode(&record)
    }

    /// Removes a template and hands back what was removed.
    pub async fn delete(&self, id: RecordId) -> Result<Template, ServiceError> {
        let template = self.get(id).await?;
        let outcome = self
            .ctx
            .store
            .delete_records(EntityKind::Template, vec![id])
            .await?;
        self.ctx
            .report_failures(EntityKind::Template, "delete", outcome.failures());
        if outcome.successes().any(|deleted| *deleted == id) {
            tracing::info!(id, "Template deleted");
            Ok(template)
        } else {
            Err(ServiceError::WriteFailed(format!("Failed to delete template {id}")))
        }
    }

    /// Clones a template into a new, unsaved draft chain. The template itself is untouched.
    pub async fn use_template(&self, id: RecordId) -> Result<Chain, ServiceError> {
        let template = self.get(id).await?;
        let name = template.name.clone();
        let chain = template.into_chain()?;
        self.ctx
            .notify(Notification::success(format!("Template \"{name}\" copied to a new chain")));
        Ok(chain)
    }

    /// Templates whose name or description contains `query`; `category` of `None` or `"all"` matches any.
    pub async fn search(&self, query: &str, category: Option<&str>) -> Vec<Template> {
        self.list()
            .await
            .into_iter()
            .filter(|t| t.matches(query, category))
            .collect()
    }

    pub async fn categories(&self) -> Vec<String> {
        chain::categories(&self.list().await)
    }
}
