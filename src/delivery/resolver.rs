//! Recipient identifier to chat handle.

use super::DeliveryError;
use crate::config::{DeliveryPolicy, SessionConfig};
use crate::session::{ChatHandle, MessagingSession, SessionError};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

static PHONE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]+$").expect("valid phone number regex"));

/// Addressing conventions and retry bounds for resolution.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub status_label: String,
    pub broadcast_id: String,
    pub contact_suffix: String,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl ResolverSettings {
    pub fn new(session: &SessionConfig, policy: &DeliveryPolicy) -> Self {
        Self {
            status_label: session.status_label.clone(),
            broadcast_id: session.broadcast_id.clone(),
            contact_suffix: session.contact_suffix.clone(),
            attempts: policy.resolve_attempts.max(1),
            retry_delay: policy.resolve_retry_delay(),
        }
    }
}

pub struct ChatResolver {
    settings: ResolverSettings,
}

impl ChatResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    /// Rewrite the caller's identifier into the session's addressing form.
    ///
    /// The status label maps to the broadcast id and `+<digits>` becomes
    /// `<digits>@<suffix>`. Anything else is returned unchanged.
    pub fn resolve_identifier(&self, raw: &str) -> String {
        if raw == self.settings.status_label {
            self.settings.broadcast_id.clone()
        } else if PHONE_NUMBER_RE.is_match(raw) {
            format!("{}@{}", &raw[1..], self.settings.contact_suffix)
        } else {
            raw.to_string()
        }
    }

    /// Find the chat for `raw`.
    ///
    /// A blank identifier is never looked up. Only frame detachment is
    /// retried; exhausting those retries yields [`DeliveryError::SessionCrashed`].
    pub async fn resolve(
        &self,
        session: &dyn MessagingSession,
        raw: &str,
    ) -> Result<ChatHandle, DeliveryError> {
        if raw.trim().is_empty() {
            warn!("Empty recipient identifier");
            return Err(DeliveryError::ChatNotFound {
                raw: raw.to_string(),
                resolved: raw.to_string(),
            });
        }

        let resolved = self.resolve_identifier(raw);
        if resolved != raw {
            info!(raw, resolved = %resolved, "Rewrote recipient identifier");
        }

        let attempts = self.settings.attempts;
        let mut attempt = 1;
        loop {
            debug!(chat_id = %resolved, attempt, attempts, "Finding chat");

            match self.lookup(session, raw, &resolved).await {
                Ok(Some(chat)) => {
                    info!(chat_id = chat.id(), name = ?chat.name(), "Chat found");
                    return Ok(chat);
                }
                Ok(None) => {
                    return Err(DeliveryError::ChatNotFound {
                        raw: raw.to_string(),
                        resolved,
                    });
                }
                Err(e) if e.is_transient_detachment() && attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        error = %e,
                        "Frame detached while finding chat, waiting"
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient_detachment() => {
                    error!(
                        error = %e,
                        "Failed to find chat after retries, browser may have crashed"
                    );
                    return Err(DeliveryError::SessionCrashed(e));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn lookup(
        &self,
        session: &dyn MessagingSession,
        raw: &str,
        resolved: &str,
    ) -> Result<Option<ChatHandle>, SessionError> {
        if !session.is_ready() {
            return Err(SessionError::NotReady);
        }

        if resolved.contains('@') {
            match session.get_chat_by_id(resolved).await {
                Ok(Some(chat)) => return Ok(Some(chat)),
                Ok(None) => {
                    debug!(chat_id = resolved, "No chat with that id, searching by name")
                }
                Err(e) => warn!(
                    chat_id = resolved,
                    error = %e,
                    "Could not get chat by id, searching by name"
                ),
            }
        }

        let chats = session.get_chats().await?;
        let found = chats
            .iter()
            .position(|c| c.name.as_deref() == Some(raw))
            .or_else(|| {
                chats
                    .iter()
                    .position(|c| c.name.as_deref().is_some_and(|n| n.contains(raw)))
            });

        match found {
            Some(index) => Ok(Some(ChatHandle::from(chats[index].clone()))),
            None => {
                warn!(raw, searched = chats.len(), "Chat not found by name");
                Ok(None)
            }
        }
    }
}
