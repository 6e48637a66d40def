//! A signed-in (or not yet signed-in) Google account.
//!
//! [`GoogleAccount`] owns the token file, the OAuth client and the Calendar
//! API client, and implements [`EventPublisher`] on top of them.

use std::path::PathBuf;

use calpost_core::EventDraft;
use tokio::sync::RwLock as TokioRwLock;
use tracing::{debug, info, warn};

use crate::client::{CalendarListEntry, CreatedEvent, GoogleCalendarClient, InsertOptions};
use crate::config::GoogleConfig;
use crate::error::{GoogleError, GoogleResult};
use crate::oauth::{OAuthClient, Revocation};
use crate::publisher::{BoxFuture, EventPublisher};
use crate::tokens::TokenStorage;

/// Snapshot of an account's authentication state.
#[derive(Debug, Clone)]
pub struct AccountStatus {
    /// Account label (e.g. `"google:default"`).
    pub account: String,
    /// Whether usable tokens are stored.
    pub is_authenticated: bool,
    /// Whether the login flow must be run again.
    pub needs_reauth: bool,
    /// Whether a refresh token is stored.
    pub has_refresh_token: bool,
    /// Seconds until the access token expires; negative once expired.
    pub expires_in_secs: Option<i64>,
    /// Where the tokens live.
    pub token_path: PathBuf,
    /// Calendar events are posted to.
    pub calendar_id: String,
    /// Number of calendars visible to the account, when it could be fetched.
    pub calendar_count: Option<usize>,
    /// Any current error state.
    pub error: Option<String>,
}

/// Google account used to post events.
pub struct GoogleAccount {
    config: GoogleConfig,
    label: String,
    insert_options: InsertOptions,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    api_client: TokioRwLock<Option<GoogleCalendarClient>>,
}

impl GoogleAccount {
    /// Creates an account from its configuration.
    ///
    /// Loads any stored tokens but does not contact Google.
    pub fn new(config: GoogleConfig) -> GoogleResult<Self> {
        config.validate().map_err(GoogleError::configuration)?;

        let label = config.account_label();
        let token_storage = TokenStorage::new(&config.token_path);
        if let Err(e) = token_storage.load() {
            warn!("ignoring unreadable token file: {}", e);
        }

        let oauth_client = OAuthClient::new(config.credentials.clone(), config.timeout)?;
        let insert_options = InsertOptions {
            time_zone: config.time_zone.clone(),
            ..InsertOptions::default()
        };

        Ok(Self {
            config,
            label,
            insert_options,
            token_storage,
            oauth_client,
            api_client: TokioRwLock::new(None),
        })
    }

    /// Sets the length of events posted without an end.
    pub fn with_default_duration(mut self, duration: chrono::Duration) -> Self {
        self.insert_options.default_duration = duration;
        self
    }

    /// Returns the account configuration.
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Runs the browser login flow and stores the tokens.
    pub async fn authenticate(&self) -> GoogleResult<()> {
        info!(account = %self.label, "starting Google authentication flow");

        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await
            .map_err(|e| e.with_account(&self.label))?;

        self.token_storage.set(tokens.clone())?;
        *self.api_client.write().await = Some(self.new_client(&tokens.access_token)?);

        info!("authentication successful");
        Ok(())
    }

    /// Returns true if stored tokens can be used now or after a refresh.
    pub fn is_authenticated(&self) -> bool {
        self.token_storage.has_usable_tokens()
    }

    /// Returns true if the login flow must be run again.
    pub fn needs_reauth(&self) -> bool {
        !self.is_authenticated() || self.token_storage.needs_reauth(&self.config.scopes)
    }

    /// Makes sure a valid access token is loaded, refreshing it if expired.
    pub async fn ensure_authenticated(&self) -> GoogleResult<()> {
        let tokens = self.token_storage.get().ok_or_else(|| {
            GoogleError::authentication("not authenticated, run 'calpost auth google'")
                .with_account(&self.label)
        })?;

        if !tokens.is_expired() {
            let mut client = self.api_client.write().await;
            if client.is_none() {
                *client = Some(self.new_client(&tokens.access_token)?);
            }
            return Ok(());
        }

        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            GoogleError::authentication("access token expired and no refresh token stored")
                .with_account(&self.label)
        })?;

        debug!("refreshing expired access token");
        let (access_token, expires_in) = self
            .oauth_client
            .refresh_token(refresh_token)
            .await
            .map_err(|e| e.with_account(&self.label))?;
        self.token_storage
            .update_access_token(&access_token, expires_in)?;

        let mut client = self.api_client.write().await;
        match client.as_mut() {
            Some(c) => c.set_access_token(&access_token),
            None => *client = Some(self.new_client(&access_token)?),
        }
        Ok(())
    }

    /// Creates an event in the configured calendar.
    ///
    /// The draft, with its end resolved, is validated before anything is
    /// sent.
    pub async fn post_event(&self, draft: &EventDraft) -> GoogleResult<CreatedEvent> {
        let end = draft.resolved_end(self.insert_options.default_duration);
        let draft = &draft.clone().with_end(end);
        draft
            .validate()
            .map_err(|e| GoogleError::bad_request(e.to_string()))?;
        self.ensure_authenticated().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| GoogleError::internal("API client not available"))?;

        let event = client
            .insert_event(&self.config.calendar_id, draft, &self.insert_options)
            .await
            .map_err(|e| e.with_account(&self.label))?;
        info!(id = %event.id, calendar = %self.config.calendar_id, "posted event");
        Ok(event)
    }

    /// Creates an event from free text with Google's Quick Add.
    pub async fn quick_add(&self, text: &str) -> GoogleResult<CreatedEvent> {
        self.ensure_authenticated().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| GoogleError::internal("API client not available"))?;

        let event = client
            .quick_add(&self.config.calendar_id, text)
            .await
            .map_err(|e| e.with_account(&self.label))?;
        info!(id = %event.id, "quick-added event");
        Ok(event)
    }

    /// Lists the calendars on the account's calendar list.
    pub async fn list_calendars(&self) -> GoogleResult<Vec<CalendarListEntry>> {
        self.ensure_authenticated().await?;

        let client = self.api_client.read().await;
        let client = client
            .as_ref()
            .ok_or_else(|| GoogleError::internal("API client not available"))?;

        client
            .list_calendars()
            .await
            .map_err(|e| e.with_account(&self.label))
    }

    /// Revokes the grant at Google and forgets the local tokens.
    ///
    /// Local tokens are removed even when the remote call fails. Returns
    /// `None` when there was nothing to revoke.
    pub async fn revoke_access(&self) -> GoogleResult<Option<Revocation>> {
        let Some(tokens) = self.token_storage.get() else {
            self.token_storage.clear()?;
            return Ok(None);
        };

        let remote = self.oauth_client.revoke(tokens.revocable_token()).await;

        *self.api_client.write().await = None;
        self.token_storage.clear()?;

        match remote {
            Ok(outcome) => {
                info!(account = %self.label, ?outcome, "access revoked");
                Ok(Some(outcome))
            }
            Err(e) => Err(e.with_account(&self.label)),
        }
    }

    /// Reports authentication state, and the calendar count when signed in.
    pub async fn status(&self) -> AccountStatus {
        let tokens = self.token_storage.get();
        let mut status = AccountStatus {
            account: self.label.clone(),
            is_authenticated: self.is_authenticated(),
            needs_reauth: self.needs_reauth(),
            has_refresh_token: tokens
                .as_ref()
                .is_some_and(|t| t.refresh_token.is_some()),
            expires_in_secs: tokens
                .as_ref()
                .and_then(|t| t.time_until_expiry())
                .map(|d| d.num_seconds()),
            token_path: self.token_storage.path().to_path_buf(),
            calendar_id: self.config.calendar_id.clone(),
            calendar_count: None,
            error: None,
        };

        match &tokens {
            None => status.error = Some("not authenticated".to_string()),
            Some(t) if !t.is_usable() => {
                status.error = Some("tokens expired and no refresh token".to_string());
            }
            Some(_) => match self.list_calendars().await {
                Ok(calendars) => status.calendar_count = Some(calendars.len()),
                Err(e) => status.error = Some(e.message().to_string()),
            },
        }

        status
    }

    fn new_client(&self, access_token: &str) -> GoogleResult<GoogleCalendarClient> {
        GoogleCalendarClient::with_user_agent(
            access_token,
            self.config.timeout,
            Some(&self.config.user_agent),
        )
    }
}

impl std::fmt::Debug for GoogleAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAccount")
            .field("label", &self.label)
            .field("calendar_id", &self.config.calendar_id)
            .field("token_path", &self.token_storage.path())
            .finish_non_exhaustive()
    }
}

impl EventPublisher for GoogleAccount {
    fn name(&self) -> &str {
        &self.label
    }

    fn publish(&self, draft: EventDraft) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
        Box::pin(async move { self.post_event(&draft).await })
    }

    fn quick_add(&self, text: String) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
        Box::pin(async move { GoogleAccount::quick_add(self, &text).await })
    }
}
