use super::definition::Chain;
use crate::error::ConversionError;

/// A trait for models that can be turned into a fresh, unsaved [`Chain`].
///
/// This is the seam through which templates and wizard drafts become editable chains.
/// Implement it on your own structs to import chains from other formats.
///
/// # Example
///
/// ```rust
/// use chainforge::prelude::{Chain, ConversionError, IntoChain, Node};
///
/// struct Questionnaire {
///     title: String,
///     questions: Vec<(String, String)>,
/// }
///
/// impl IntoChain for Questionnaire {
///     fn into_chain(self) -> Result<Chain, ConversionError> {
///         if self.questions.is_empty() {
///             return Err(ConversionError::NoFields);
///         }
///         let mut chain = Chain::new(self.title);
///         for (i, (label, variable)) in self.questions.into_iter().enumerate() {
///             chain
///                 .add_node(Node::new(format!("node-{}", i + 1), label, variable))
///                 .map_err(|e| ConversionError::ValidationError(e.to_string()))?;
///         }
///         Ok(chain)
///     }
/// }
/// ```
pub trait IntoChain {
    /// Consumes the object and converts it into a draft chain.
    fn into_chain(self) -> Result<Chain, ConversionError>;
}

impl IntoChain for Chain {
    fn into_chain(self) -> Result<Chain, ConversionError> {
        Ok(self)
    }
}
