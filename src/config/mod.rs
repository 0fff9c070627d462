pub mod loader;
pub mod types;

pub use loader::{credentials_path, load_config, resolve_config};
pub use types::{AuthSettings, ClientAuthMethod, ClientCredentials, Config, Deployment};
