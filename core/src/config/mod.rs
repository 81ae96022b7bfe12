pub mod load;
mod types;

pub use load::{load_from, DEFAULT_CONFIG_FILE};
pub use types::{
    AppConfig, ControlConfig, ExitCodeConfig, LoggingConfig, RetentionConfig, RetentionPolicy,
    ToolConfig,
};
