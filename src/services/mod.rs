pub mod diagnostics;
pub mod ids;
pub mod illustration;
pub mod images;
pub mod json_extract;
pub mod openai;
pub mod palm_analysis;
pub mod palm_validation;
pub mod pipeline;
pub mod prompts;
pub mod store;
