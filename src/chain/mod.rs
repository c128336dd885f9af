pub mod conversion;
pub mod definition;
pub mod editing;
pub mod template;

pub use conversion::*;
pub use definition::*;
pub use editing::*;
pub use template::*;
