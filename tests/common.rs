//! Common test utilities for building chains, stores and services.
use async_trait::async_trait;
use chainforge::chain::{Chain, FieldType, Node, Position, RecordId, Template};
use chainforge::error::StoreError;
use chainforge::notify::RecordingNotifier;
use chainforge::service::ServiceContext;
use chainforge::store::{
    BatchOutcome, EntityKind, Fields, InMemoryStore, Record, RecordFilter, RecordStore,
};
use chainforge::substitution::Responses;
use std::sync::Arc;

/// A three-field chain: `topic` (text) -> `audience` (select) -> `tone` (select).
#[allow(dead_code)]
pub fn create_blog_chain() -> Chain {
    let mut chain = Chain::new("Blog Writer")
        .with_final_prompt("Write about {{topic}} for {{audience}} in a {{tone}} tone.");
    chain
        .add_node(Node::new("node-1", "Topic", "topic").at(Position::new(250.0, 100.0)))
        .unwrap();
    chain
        .add_node(
            Node::new("node-2", "Audience", "audience")
                .with_type(FieldType::Select)
                .with_options(["General", "Professional", "Students", "Seniors"])
                .at(Position::new(250.0, 250.0)),
        )
        .unwrap();
    chain
        .add_node(
            Node::new("node-3", "Tone", "tone")
                .with_type(FieldType::Select)
                .with_options(["Professional", "Casual", "Friendly", "Formal"])
                .at(Position::new(250.0, 400.0)),
        )
        .unwrap();
    chain.connect("node-1", "node-2").unwrap();
    chain.connect("node-2", "node-3").unwrap();
    chain
}

#[allow(dead_code)]
pub fn create_template(name: &str, category: &str) -> Template {
    let chain = create_blog_chain();
    Template {
        name: name.to_string(),
        description: format!("{} starter", name),
        category: category.to_string(),
        nodes: chain.nodes,
        connections: chain.connections,
        settings: chain.settings,
        final_prompt: chain.final_prompt,
        uses: 12,
        rating: 4.5,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn responses(pairs: &[(&str, &str)]) -> Responses {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A context over a fresh in-memory store, with notifications captured.
#[allow(dead_code)]
pub fn context_with(store: impl RecordStore + 'static) -> (ServiceContext, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = ServiceContext::new(Arc::new(store)).with_notifier(notifier.clone());
    (ctx, notifier)
}

#[allow(dead_code)]
pub fn memory_context() -> (ServiceContext, Arc<RecordingNotifier>) {
    context_with(InMemoryStore::new())
}

/// A store whose every call fails, as an unreachable backend would.
#[allow(dead_code)]
pub struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn list(&self, _kind: EntityKind, _filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        Err(offline())
    }

    async fn get_by_id(&self, _kind: EntityKind, _id: RecordId) -> Result<Record, StoreError> {
        Err(offline())
    }

    async fn create_records(
        &self,
        _kind: EntityKind,
        _records: Vec<Fields>,
    ) -> Result<BatchOutcome<Record>, StoreError> {
        Err(offline())
    }

    async fn update_records(
        &self,
        _kind: EntityKind,
        _records: Vec<(RecordId, Fields)>,
    ) -> Result<BatchOutcome<Record>, StoreError> {
        Err(offline())
    }

    async fn delete_records(
        &self,
        _kind: EntityKind,
        _ids: Vec<RecordId>,
    ) -> Result<BatchOutcome<RecordId>, StoreError> {
        Err(offline())
    }
}

fn offline() -> StoreError {
    StoreError::Rejected("connection refused".to_string())
}
