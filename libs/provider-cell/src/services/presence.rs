use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{PresenceStatus, Provider, ProviderError};

/// Provider presence and lookup. Presence is a stored attribute mutated only
/// through `set_presence`; nothing here changes it as a side effect of other
/// operations.
pub struct PresenceService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl PresenceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(supabase: Arc<SupabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { supabase, clock }
    }

    pub async fn set_presence(
        &self,
        provider_id: Uuid,
        presence: PresenceStatus,
        auth_token: &str,
    ) -> Result<Provider, ProviderError> {
        debug!("Setting provider {} presence to {}", provider_id, presence);

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let updated: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "presence": presence,
                    "updated_at": self.clock.now().to_rfc3339()
                })),
            )
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(ProviderError::NotFound)?;
        let provider: Provider = serde_json::from_value(row)
            .map_err(|e| ProviderError::DatabaseError(format!("failed to parse provider: {}", e)))?;

        info!("Provider {} is now {}", provider.id, provider.presence);
        Ok(provider)
    }

    pub async fn get_provider(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Provider, ProviderError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let mut providers = self.fetch_providers(&path, auth_token).await?;
        if providers.is_empty() {
            return Err(ProviderError::NotFound);
        }
        Ok(providers.remove(0))
    }

    /// Providers currently accepting bookings, for the patient booking flow.
    pub async fn list_online_providers(
        &self,
        auth_token: &str,
    ) -> Result<Vec<Provider>, ProviderError> {
        let path = format!(
            "/rest/v1/providers?presence=eq.{}&order=display_name.asc",
            PresenceStatus::Online
        );
        self.fetch_providers(&path, auth_token).await
    }

    async fn fetch_providers(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Provider>, ProviderError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Provider>, _>>()
            .map_err(|e| ProviderError::DatabaseError(format!("failed to parse providers: {}", e)))
    }
}
