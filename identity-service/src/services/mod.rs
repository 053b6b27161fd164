//! Services layer.
//!
//! Every service is explicitly constructed with its collaborators (store,
//! codec, mailer) so tests can wire isolated instances.

mod access;
mod auth;
mod email;
pub mod error;
mod jwt;
mod oauth;
mod rbac;
mod token;

pub use access::UserAccessService;
pub use auth::AuthService;
pub use email::{LogMailer, Mailer, RecordingMailer, SentMail, SmtpMailer};
pub use error::ServiceError;
pub use jwt::{parse_expiry, TokenClaims, TokenCodec};
pub use oauth::{OAuthProfile, OAuthService};
pub use rbac::{PermissionService, RoleService};
pub use token::{TokenPair, TokenService};
