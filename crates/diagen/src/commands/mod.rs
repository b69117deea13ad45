//! CLI command implementations.

pub(crate) mod check_config;
pub(crate) mod generate;

pub(crate) use check_config::CheckConfigArgs;
pub(crate) use generate::GenerateArgs;
