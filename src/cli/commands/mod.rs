//! CLI command implementations.

mod clean;
mod config;
mod doctor;
mod run;
mod status;

pub use clean::run_clean;
pub use config::run_config;
pub use doctor::run_doctor;
pub use run::run_channel;
pub use status::run_status;
