mod settings;

pub use settings::{DeliveryConfig, DirectoryConfig, ServerConfig, Settings};
