//! Google OAuth and Calendar support for calpost.
//!
//! # Authentication Flow
//!
//! 1. The user provides their own OAuth client ID/secret (Google requires it)
//! 2. A loopback listener is started on the first free port of a range
//! 3. The browser is opened on Google's consent page with a PKCE challenge
//! 4. Google redirects to the listener with the authorization code
//! 5. The code is exchanged for access and refresh tokens, which are stored
//!
//! # Example
//!
//! ```ignore
//! use calpost_google::{GoogleAccount, GoogleConfig, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//! let account = GoogleAccount::new(GoogleConfig::new(credentials))?;
//!
//! if account.needs_reauth() {
//!     account.authenticate().await?;
//! }
//!
//! let created = account.post_event(&draft).await?;
//! println!("{}", created.html_link.unwrap_or_default());
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod oauth;
pub mod publisher;
pub mod tokens;

pub use account::{AccountStatus, GoogleAccount};
pub use client::{CalendarListEntry, CreatedEvent, GoogleCalendarClient, InsertOptions, NewEvent};
pub use config::{GoogleConfig, OAuthCredentials};
pub use error::{GoogleError, GoogleErrorCode, GoogleResult};
pub use oauth::{OAuthClient, PkceFlow, Revocation};
pub use publisher::{BoxFuture, ErrorPublisher, EventPublisher};
pub use tokens::{TokenInfo, TokenStorage};
