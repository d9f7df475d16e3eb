//! Session storage, single-flight token refresh, and the surface bridge.

pub mod bridge;
pub mod error;
pub mod http;
pub mod refresh;
pub mod store;
pub mod token;

pub use bridge::{parse_inbound, AuthBridge, BridgeInbound, BridgeOutbound};
pub use error::AuthError;
pub use http::HttpTokenRefresher;
pub use refresh::{FailureHook, RefreshCoordinator, RefreshOutcome, TokenRefresher};
pub use store::{FileSessionStore, SessionStore};
pub use token::{jwt_expiry, AccessToken};
