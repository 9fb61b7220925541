pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod notifier;
pub mod providers;
pub mod types;

pub use cache::Cache;
pub use channel::{BusinessHoursResolver, ChannelResolver, MapChannelResolver};
pub use config::{Config, LarkAppCredentials, LarkSettings, SlackSettings, load_settings};
pub use error::{AlertError, Result};
pub use notifier::Notifier;
pub use types::{AlertLevel, Attachment, Provider, SendMethod};
