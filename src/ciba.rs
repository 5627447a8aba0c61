//! Client-initiated backchannel authentication in poll mode.
//!
//! [`Issuer::start_authentication`](crate::issuer::Issuer::start_authentication) turns
//! [`AuthenticationHints`] into an initiation request and returns an [`AuthSession`] holding
//! the provider-assigned `auth_req_id`. The session then polls the token endpoint, one attempt
//! at a time through [`AuthSession::poll`] or cooperatively through
//! [`AuthSession::run_until_complete`], until the user approves, the provider reports a
//! terminal error, or the caller cancels.

pub mod hints;
pub mod poll;
pub mod proof;
pub mod session;

mod metrics;

pub use hints::*;
pub use metrics::PollMetrics;
pub use poll::*;
pub use session::*;
