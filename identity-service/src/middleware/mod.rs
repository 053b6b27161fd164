pub mod auth;
pub mod authorize;
pub mod token_kind;

pub use auth::{auth_middleware, extract_bearer_token, AuthUser};
pub use authorize::{authorize_middleware, AuthzLayer, AuthzRequirements};
pub use token_kind::{token_kind_middleware, RequiredKind};
