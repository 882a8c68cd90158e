pub mod config;
pub mod error;
pub mod events;
pub mod redact;
pub mod types;
pub mod user_config;

pub use config::VocalisConfig;
pub use error::{Result, VocalisError};
pub use events::{InboundEvent, ModelStatusUpdate, Topic};
pub use types::*;
pub use user_config::{ConfigSection, ReplacementRule, UserConfig};
