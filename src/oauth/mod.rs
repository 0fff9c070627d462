pub mod callback;
pub mod flow;
pub mod refresh;
pub mod state;
pub mod store;
pub mod token;

pub use callback::{parse_callback_target, CallbackListener, CallbackParams};
pub use flow::{authorization_url, AuthorizationFlow, PendingAuthorization};
pub use refresh::TokenRefresher;
pub use state::{AuthorizationState, PkceChallenge};
pub use store::CredentialStore;
pub use token::{RefreshFailure, TokenEndpoint, TokenRecord, TokenStatus};
