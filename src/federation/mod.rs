//! Federated login against an external OAuth2 identity provider.

pub mod audit;
pub mod flow;
pub mod provider;
pub mod userinfo;
pub mod users;

pub use flow::IdentityFederationFlow;
pub use provider::{CodeExchanger, OAuthProvider};
pub use userinfo::{HttpInfoExtractor, InfoExtractor, ProviderProfile};
pub use users::{IdGenerator, InMemoryUserStore, UserIdentity, UserStore, uuid_ids};
