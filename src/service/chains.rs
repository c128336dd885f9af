use super::{ServiceContext, decode, decode_all, report_load_failure, simulate_latency};
use crate::chain::{Chain, RecordId};
use crate::error::ServiceError;
use crate::execution::{ChainExecutor, ExecutionBackend, ResponseRecord, SimulatedBackend};
use crate::form::{FormCompiler, FormDescriptor};
use crate::inference::{FieldInferer, PromptAnalysis};
use crate::notify::Notification;
use crate::store::{EntityKind, RecordFilter, SortOrder, StoredEntity};
use crate::substitution::Responses;
use ahash::AHashSet;
use chrono::Utc;
use std::sync::Mutex;

/// Prompt chain CRUD plus the form, execution and analysis operations built on top of it.
pub struct ChainService {
    ctx: ServiceContext,
    inferer: FieldInferer,
    compiler: FormCompiler,
    executor: ChainExecutor,
    saving: Mutex<AHashSet<RecordId>>,
}

/// Releases a chain id from the in-flight set when the save finishes, however it finishes.
struct SaveGuard<'a> {
    saving: &'a Mutex<AHashSet<RecordId>>,
    id: RecordId,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        let mut saving = self.saving.lock().unwrap_or_else(|e| e.into_inner());
        saving.remove(&self.id);
    }
}

impl ChainService {
    /// A service that executes chains with the simulator, using the latencies from the context's config.
    pub fn new(ctx: ServiceContext) -> Self {
        let backend = SimulatedBackend::new().with_latency(ctx.config.simulation.execute_latency());
        Self {
            ctx,
            inferer: FieldInferer::default(),
            compiler: FormCompiler::default(),
            executor: ChainExecutor::new(backend),
            saving: Mutex::new(AHashSet::new()),
        }
    }

    pub fn with_backend(mut self, backend: impl ExecutionBackend + 'static) -> Self {
        self.executor = ChainExecutor::new(backend);
        self
    }

    pub fn with_compiler(mut self, compiler: FormCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_inferer(mut self, inferer: FieldInferer) -> Self {
        self.inferer = inferer;
        self
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// All chains, newest first. Failures are notified and yield an empty list.
    pub async fn list(&self) -> Vec<Chain> {
        let filter = RecordFilter::new().order_by("created_at", SortOrder::Desc);
        match self.ctx.store.list(EntityKind::PromptChain, &filter).await {
            Ok(records) => decode_all(&self.ctx, &records),
            Err(e) => {
                report_load_failure(&self.ctx, "prompt chains", &e);
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: RecordId) -> Result<Chain, ServiceError> {
        let record = self.ctx.store.get_by_id(EntityKind::PromptChain, id).await?;
        decode(&record)
    }

    pub async fn create(&self, mut chain: Chain) -> Result<Chain, ServiceError> {
        self.check(&chain)?;
        let now = Utc::now();
        chain.created_at = Some(now);
        chain.updated_at = Some(now);

        let outcome = self
            .ctx
            .store
            .create(EntityKind::PromptChain, chain.to_fields())
            .await?;
        let record = self.ctx.written(EntityKind::PromptChain, "create", outcome)?;
        tracing::info!(id = record.id, name = %chain.name, "Prompt chain created");
        self.ctx.notify(Notification::success("Chain created successfully"));
        decode(&record)
    }

    /// Creates several chains in one batch. Invalid chains and records the store rejects are
    /// reported individually; every chain that was written is returned.
    pub async fn create_many(&self, chains: Vec<Chain>) -> Result<Vec<Chain>, ServiceError> {
        let now = Utc::now();
        let mut batch = Vec::with_capacity(chains.len());
        for mut chain in chains {
            if let Err(e) = self.check(&chain) {
                tracing::warn!(chain = %chain.name, error = %e, "Skipping invalid chain");
                self.ctx.notify(Notification::error(e.to_string()));
                continue;
            }
            chain.created_at = Some(now);
            chain.updated_at = Some(now);
            batch.push(chain.to_fields());
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let outcome = self
            .ctx
            .store
            .create_records(EntityKind::PromptChain, batch)
            .await?;
        let (records, failures) = outcome.into_parts();
        self.ctx
            .report_failures(EntityKind::PromptChain, "create", &failures);
        if !records.is_empty() {
            tracing::info!(created = records.len(), failed = failures.len(), "Prompt chains created");
            self.ctx.notify(Notification::success(format!(
                "{} chain(s) created successfully",
                records.len()
            )));
        }
        Ok(decode_all(&self.ctx, &records))
    }

    /// Saves over an existing chain. Only one save per chain id may be in flight.
    pub async fn update(&self, id: RecordId, mut chain: Chain) -> Result<Chain, ServiceError> {
        let _guard = self.begin_save(id)?;
        self.check(&chain)?;
        self.ctx.store.get_by_id(EntityKind::PromptChain, id).await?;
        chain.updated_at = Some(Utc::now());

        let mut fields = chain.to_fields();
        fields.remove("created_at");
        let outcome = self.ctx.store.update(EntityKind::PromptChain, id, fields).await?;
        let record = self.ctx.written(EntityKind::PromptChain, "update", outcome)?;
        tracing::info!(id, name = %chain.name, "Prompt chain updated");
        self.ctx.notify(Notification::success("Chain updated successfully"));
        decode(&record)
    }

    /// Creates unsaved chains and updates saved ones.
    pub async fn save(&self, chain: Chain) -> Result<Chain, ServiceError> {
        match chain.id {
            Some(id) => self.update(id, chain).await,
            None => self.create(chain).await,
        }
    }

    /// Returns whether the chain was deleted.
    pub async fn delete(&self, id: RecordId) -> Result<bool, ServiceError> {
        let outcome = self
            .ctx
            .store
            .delete_records(EntityKind::PromptChain, vec![id])
            .await?;
        self.ctx
            .report_failures(EntityKind::PromptChain, "delete", outcome.failures());
        let deleted = outcome.successes().any(|deleted| *deleted == id);
        if deleted {
            tracing::info!(id, "Prompt chain deleted");
            self.ctx.notify(Notification::success("Chain deleted successfully"));
        }
        Ok(deleted)
    }

    /// Compiles the stored chain into its runtime form.
    pub async fn generate_form(&self, id: RecordId) -> Result<FormDescriptor, ServiceError> {
        simulate_latency(self.ctx.config.simulation.generate_form_latency()).await;
        let chain = self.get(id).await?;
        Ok(self.compiler.compile_form(&chain.nodes, &chain.final_prompt))
    }

    /// Validates the responses against the chain's form, then runs the chain once.
    ///
    /// Falls back to the configured default model when `model` is `None`.
    pub async fn execute(
        &self,
        id: RecordId,
        responses: &Responses,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Result<ResponseRecord, ServiceError> {
        let chain = self.get(id).await?;
        self.compiler
            .compile_form(&chain.nodes, &chain.final_prompt)
            .validate(responses)?;

        let model = model.unwrap_or(&self.ctx.config.default_model);
        let record = self
            .executor
            .execute(&chain, responses, model, api_key)
            .await
            .inspect_err(|e| {
                self.ctx
                    .notify(Notification::error(format!("Execution failed: {e}")))
            })?;
        tracing::info!(id, model, total_tokens = record.token_usage.total, "Chain executed");
        Ok(record)
    }

    pub async fn analyze_prompt(&self, prompt: &str) -> PromptAnalysis {
        simulate_latency(self.ctx.config.simulation.analyze_latency()).await;
        self.inferer.analyze(prompt)
    }

    /// Blocking issues reject the save; warnings are only reported.
    fn check(&self, chain: &Chain) -> Result<(), ServiceError> {
        let (blocking, warnings): (Vec<_>, Vec<_>) =
            chain.validate().into_iter().partition(|issue| issue.is_blocking());
        for warning in &warnings {
            tracing::warn!(chain = %chain.name, issue = %warning, "Saving chain with warnings");
            self.ctx.notify(Notification::warning(warning.to_string()));
        }
        if blocking.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::InvalidChain(blocking))
        }
    }

    fn begin_save(&self, id: RecordId) -> Result<SaveGuard<'_>, ServiceError> {
        let mut saving = self.saving.lock().unwrap_or_else(|e| e.into_inner());
        if !saving.insert(id) {
            tracing::debug!(id, "Rejecting overlapping save");
            return Err(ServiceError::SaveInProgress(id));
        }
        Ok(SaveGuard {
            saving: &self.saving,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;
    use tokio_test::block_on;

    fn service() -> ChainService {
        ChainService::new(ServiceContext::new(Arc::new(InMemoryStore::new())))
    }

    #[test]
    fn overlapping_saves_for_the_same_chain_are_rejected() {
        let service = service();
        let first = service.begin_save(7).unwrap();
        assert_eq!(
            service.begin_save(7).err(),
            Some(ServiceError::SaveInProgress(7))
        );
        assert!(service.begin_save(8).is_ok());
        drop(first);
        assert!(service.begin_save(7).is_ok());
    }

    #[test]
    fn save_creates_then_updates() {
        let service = service();
        let created = block_on(service.save(Chain::starter())).unwrap();
        let id = created.id.unwrap();

        let mut edited = created.clone();
        edited.name = "Renamed".to_string();
        let updated = block_on(service.save(edited)).unwrap();
        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(block_on(service.list()).len(), 1);
    }
}
