//! End-to-end tests: prompt in, executed chain out.
//!
mod common;
use chainforge::inference::infer;
use chainforge::prelude::*;
use chainforge::service::ServiceContext;
use chainforge::substitution::unresolved_variables;
use common::*;
use std::sync::Arc;
use tokio_test::block_on;

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    #[test]
    fn test_prompt_to_execution() {
        let prompt = "Write a blog post about a topic for my target audience in a casual tone";
        let analysis = FieldInferer::default().analyze(prompt);
        assert!(!analysis.fields.is_empty());

        let chain = WizardDraft::new(analysis.analyzed_prompt.clone(), analysis.fields.clone())
            .named("Blog Writer")
            .into_chain()
            .expect("wizard draft converts");
        assert_eq!(chain.nodes.len(), analysis.fields.len());
        assert_eq!(chain.connections.len(), chain.nodes.len() - 1);
        assert!(chain.validate().iter().all(|issue| !issue.is_blocking()));

        // Answer every field with something its type accepts.
        let form = FormCompiler::new().compile_form(&chain.nodes, &chain.final_prompt);
        let answers: Responses = form
            .fields
            .iter()
            .map(|field| {
                let value = match &field.options {
                    Some(options) => options[0].clone(),
                    None => format!("my {}", field.label.to_lowercase()),
                };
                (field.variable.clone(), value)
            })
            .collect();
        form.validate(&answers).expect("answers are valid");

        let executor = ChainExecutor::new(SimulatedBackend::new());
        let record = block_on(executor.execute(&chain, &answers, DEFAULT_MODEL, None)).unwrap();
        assert!(record.prompt.starts_with(prompt));
        assert!(unresolved_variables(&record.prompt, &Responses::new()).is_empty());
        assert_eq!(record.token_usage.total, 470);
    }

    #[test]
    fn test_inference_is_deterministic_and_never_empty() {
        for text in ["", "   ", "hello world", "Describe the product for the audience"] {
            let first = infer(text);
            assert!(!first.is_empty(), "no fields for {:?}", text);
            assert_eq!(first, infer(text));
        }
    }

    #[test]
    fn test_compile_preserves_node_order() {
        let chain = create_blog_chain();
        let fields = chainforge::form::compile(&chain.nodes);
        assert_eq!(fields.len(), chain.nodes.len());
        for (field, node) in fields.iter().zip(&chain.nodes) {
            assert_eq!(field.id, node.id);
        }
    }

    #[test]
    fn test_substitution_scenario() {
        let out = substitute(
            "Write about {{topic}} for {{audience}}.",
            &responses(&[("topic", "bikes"), ("audience", "teens")]),
        );
        assert_eq!(out, "Write about bikes for teens.");

        let template = "Write about {{topic}} for {{audience}}.";
        assert_eq!(substitute(template, &Responses::new()), template);
    }

    #[test]
    fn test_removing_a_node_cascades_its_connections() {
        let mut chain = create_blog_chain();
        chain.remove_node("node-2").unwrap();

        assert!(chain.node("node-2").is_none());
        assert!(chain.connections.iter().all(|c| !c.touches("node-2")));
        assert!(chain.validate().is_empty());
    }

    #[test]
    fn test_execute_token_totals() {
        let mut chain = Chain::new("Pitch").with_final_prompt("Pitch {{name}}.");
        chain.add_node(Node::new("node-1", "Name", "name")).unwrap();

        let executor = ChainExecutor::new(SimulatedBackend::new());
        let record = block_on(executor.execute(
            &chain,
            &responses(&[("name", "Acme")]),
            "gpt-4-turbo-preview",
            None,
        ))
        .unwrap();
        assert_eq!(
            record.token_usage.total,
            record.token_usage.prompt + record.token_usage.completion
        );
    }

    #[test]
    fn test_store_snapshot_survives_a_restart() {
        let path = std::env::temp_dir().join(format!("chainforge-{}.bin", std::process::id()));

        let store = Arc::new(InMemoryStore::new());
        let chains = ChainService::new(ServiceContext::new(store.clone()));
        let id = block_on(chains.create(create_blog_chain())).unwrap().id.unwrap();
        block_on(store.save_snapshot(&path)).unwrap();

        let restored = InMemoryStore::from_snapshot_file(&path).unwrap();
        let chains = ChainService::new(ServiceContext::new(Arc::new(restored)));
        let chain = block_on(chains.get(id)).unwrap();
        assert_eq!(chain.name, "Blog Writer");
        assert_eq!(chain.nodes.len(), 3);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_drives_the_default_model() {
        let config = Config::from_toml_str("default_model = \"mistral-large\"").unwrap();
        let chains = ChainService::new(
            ServiceContext::new(Arc::new(InMemoryStore::new())).with_config(config),
        );
        let id = block_on(chains.create(create_blog_chain())).unwrap().id.unwrap();

        let answers = responses(&[
            ("topic", "rust"),
            ("audience", "Professional"),
            ("tone", "Formal"),
        ]);
        let record = block_on(chains.execute(id, &answers, None, None)).unwrap();
        assert_eq!(record.model, "mistral-large");
        assert!(record.response.contains("mistral-large"));
    }
}
