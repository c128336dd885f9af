//! # Chainforge - Prompt Chain Engine
//!
//! **Chainforge** is the core of a prompt-chain builder. A chain is a small graph of
//! form-field nodes; the engine turns it into a runtime form and a `{{variable}}`-templated
//! prompt, and runs that prompt through a pluggable model backend.
//!
//! ## Core Workflow
//!
//! 1.  **Infer**: Hand a free-form prompt to the [`FieldInferer`](inference::FieldInferer)
//!     and get back suggested form fields.
//! 2.  **Build**: Assemble or edit a [`Chain`](chain::Chain) directly, or convert a template
//!     or wizard draft through the [`IntoChain`](chain::IntoChain) trait.
//! 3.  **Compile**: Turn the chain's nodes into a [`FormDescriptor`](form::FormDescriptor)
//!     and validate user responses against it.
//! 4.  **Execute**: Substitute the responses into the final prompt and send it to an
//!     [`ExecutionBackend`](execution::ExecutionBackend). A simulator ships by default.
//!
//! Persistence goes through the [`RecordStore`](store::RecordStore) trait; the
//! [`service`] layer wires everything together over an injected store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chainforge::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // 1. Infer fields from a prompt and turn them into a draft chain.
//! let analysis = FieldInferer::default().analyze("Write a blog post about a topic for my audience");
//! let chain = WizardDraft::new(analysis.analyzed_prompt, analysis.fields)
//!     .named("Blog Writer")
//!     .into_chain()?;
//!
//! // 2. Compile the form and validate some answers.
//! let form = FormCompiler::new().compile_form(&chain.nodes, &chain.final_prompt);
//! let mut responses = Responses::new();
//! for field in &form.fields {
//!     responses.insert(field.variable.clone(), "Professional".to_string());
//! }
//! form.validate(&responses)?;
//!
//! // 3. Run it through the simulator.
//! let executor = ChainExecutor::new(SimulatedBackend::new());
//! let record = tokio_test::block_on(executor.execute(&chain, &responses, DEFAULT_MODEL, None))?;
//! println!("{}\n-> {} tokens", record.prompt, record.token_usage.total);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod execution;
pub mod form;
pub mod inference;
pub mod notify;
pub mod prelude;
pub mod service;
pub mod store;
pub mod substitution;
