pub mod analysis;
pub mod intake;
pub mod prompt_log;
pub mod validation;
