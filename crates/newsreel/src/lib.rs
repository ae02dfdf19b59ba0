pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
/// Feed manifest loading.
pub mod manifest;
pub mod settings;
