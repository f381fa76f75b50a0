//! API Gateway issuer implementation.

use crate::backends::aws::{classify, sdk_config};
use crate::{Config, IssuedKey, Issuer, KeysweepError, Result, Revocation};
use async_trait::async_trait;
use aws_sdk_apigateway::error::SdkError;
use aws_sdk_apigateway::Client;

/// API Gateway-backed issuer.
///
/// Keys are API Gateway API keys; usage plan binding is a usage-plan-key
/// association of type `API_KEY`. Deleting an absent key maps to
/// [`Revocation::AlreadyAbsent`], which keeps retried rotations idempotent.
pub struct ApiGatewayIssuer {
    client: Client,
    key_name: String,
}

impl ApiGatewayIssuer {
    /// Creates an issuer from configuration, loading the shared AWS SDK
    /// config (honors the `region` and `endpoint` options).
    pub async fn new(config: &Config) -> Self {
        let sdk = sdk_config(config).await;
        Self {
            client: Client::new(&sdk),
            key_name: config.key_name.clone(),
        }
    }

    /// Creates an issuer from an existing client.
    pub fn from_client(client: Client, key_name: impl Into<String>) -> Self {
        Self {
            client,
            key_name: key_name.into(),
        }
    }
}

#[async_trait]
impl Issuer for ApiGatewayIssuer {
    fn name(&self) -> &str {
        "apigateway"
    }

    async fn create_key(&self) -> Result<IssuedKey> {
        let response = self
            .client
            .create_api_key()
            .enabled(true)
            .generate_distinct_id(true)
            .name(&self.key_name)
            .send()
            .await
            .map_err(|e| classify("create_api_key", e))?;

        let key_id = response
            .id()
            .ok_or_else(|| KeysweepError::Other(anyhow::anyhow!("issuer returned no key id")))?
            .to_string();
        let key_value = response
            .value()
            .ok_or_else(|| KeysweepError::Other(anyhow::anyhow!("issuer returned no key value")))?
            .to_string();

        Ok(IssuedKey { key_id, key_value })
    }

    async fn bind_usage_plan(&self, key_id: &str, usage_plan_id: &str) -> Result<()> {
        let result = self
            .client
            .create_usage_plan_key()
            .usage_plan_id(usage_plan_id)
            .key_id(key_id)
            .key_type("API_KEY")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // The binding already exists: a retried bind after a crash.
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conflict_exception() => Ok(()),
            Err(err) => Err(classify("create_usage_plan_key", err)),
        }
    }

    async fn revoke_key(&self, key_id: &str) -> Result<Revocation> {
        let result = self.client.delete_api_key().api_key(key_id).send().await;

        match result {
            Ok(_) => Ok(Revocation::Revoked),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found_exception() => {
                Ok(Revocation::AlreadyAbsent)
            }
            Err(err) => Err(classify("delete_api_key", err)),
        }
    }
}
