//! Client registry: issuer identifier to negotiated client registration.
//!
//! The callback only reads from the registry. Registering a client with an
//! issuer (dynamic registration) happens before the authorization redirect
//! and is never attempted while handling a callback.

mod client;

pub use client::RpClient;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

pub(crate) use client::normalize_issuer;

/// Lookup of client registrations by issuer.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Returns the registration negotiated with `issuer`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotRegistered`] if no registration exists
    /// - [`RegistryError::Expired`] if the registration is no longer valid
    /// - [`RegistryError::Unavailable`] if the lookup itself failed
    async fn client_for_issuer(&self, issuer: &str) -> Result<RpClient, RegistryError>;
}

/// Error type for client registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No registration exists for the issuer.
    #[error("No client registration for issuer")]
    NotRegistered,

    /// The registration exists but has expired.
    #[error("Client registration expired at {0}")]
    Expired(OffsetDateTime),

    /// The backing storage could not be queried.
    #[error("Client registry unavailable: {0}")]
    Unavailable(String),
}

/// In-memory client registry, usually seeded from configuration.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClientRegistry {
    clients: Arc<RwLock<HashMap<String, RpClient>>>,
}

impl InMemoryClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the given registrations.
    #[must_use]
    pub fn from_clients(clients: impl IntoIterator<Item = RpClient>) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.issuer_key(), client))
            .collect();

        Self {
            clients: Arc::new(RwLock::new(clients)),
        }
    }

    /// Adds or replaces a registration.
    pub async fn register(&self, client: RpClient) {
        tracing::info!(
            issuer = %client.issuer,
            client_id = %client.client_id,
            "Registered relying-party client"
        );
        self.clients.write().await.insert(client.issuer_key(), client);
    }

    /// Returns the number of registrations.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Returns `true` if the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn client_for_issuer(&self, issuer: &str) -> Result<RpClient, RegistryError> {
        let clients = self.clients.read().await;
        let client = clients
            .get(&normalize_issuer(issuer))
            .ok_or(RegistryError::NotRegistered)?;

        if let Some(expires_at) = client.expires_at
            && client.is_expired_at(OffsetDateTime::now_utc())
        {
            return Err(RegistryError::Expired(expires_at));
        }

        Ok(client.clone())
    }
}
