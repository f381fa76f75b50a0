//! DynamoDB registry implementation.

use crate::backends::aws::{classify, sdk_config};
use crate::{Config, KeyRecord, KeysweepError, RecordUpdate, Registry, Result, UpdateOutcome};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use tracing::warn;

/// DynamoDB-backed registry.
///
/// One table, partition key `itemID`, record fields stored under the wire
/// names (`externalKeyID`, `keyValue`, `usagePlanID`, `lastRotatedAt` as an
/// ISO-8601 string). The conditional update maps straight onto an
/// `UpdateItem` with a `ConditionExpression` on `externalKeyID`, so the
/// registry itself arbitrates racing rotations.
pub struct DynamoRegistry {
    client: Client,
    table: String,
}

impl DynamoRegistry {
    /// Creates a registry from configuration, loading the shared AWS SDK
    /// config (honors the `region` and `endpoint` options).
    pub async fn new(config: &Config) -> Self {
        let sdk = sdk_config(config).await;
        Self {
            client: Client::new(&sdk),
            table: config.table.clone(),
        }
    }

    /// Creates a registry from an existing client, for tests and callers
    /// that manage SDK configuration themselves.
    pub fn from_client(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// The table this registry reads and writes.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn item_exists(&self, item_id: &str) -> Result<bool> {
        let fetched = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("itemID", AttributeValue::S(item_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| classify("get_item", e))?;

        Ok(fetched.item().is_some())
    }
}

#[async_trait]
impl Registry for DynamoRegistry {
    fn name(&self) -> &str {
        "dynamodb"
    }

    async fn scan_all(&self) -> Result<Vec<KeyRecord>> {
        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let response = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| classify("scan", e))?;

            for item in response.items() {
                match decode_record(item) {
                    Ok(record) => records.push(record),
                    // One corrupt row must not starve every other lineage
                    // of rotation; it stays untouched and visible in logs.
                    Err(err) => warn!(error = %err, "skipping malformed record"),
                }
            }

            start_key = response.last_evaluated_key().map(|k| k.clone());
            if start_key.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn conditional_update(&self, update: RecordUpdate) -> Result<UpdateOutcome> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("itemID", AttributeValue::S(update.item_id.clone()))
            .update_expression(
                "SET externalKeyID = :newKeyID, keyValue = :newKeyValue, lastRotatedAt = :rotatedAt",
            )
            .condition_expression("externalKeyID = :expectedKeyID")
            .expression_attribute_values(":newKeyID", AttributeValue::S(update.new_key_id))
            .expression_attribute_values(":newKeyValue", AttributeValue::S(update.new_key_value))
            .expression_attribute_values(":rotatedAt", AttributeValue::S(encode_timestamp(update.rotated_at)))
            .expression_attribute_values(
                ":expectedKeyID",
                AttributeValue::S(update.expected_key_id),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Applied),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conditional_check_failed_exception() => {
                // DynamoDB reports both "item missing" and "key id changed"
                // as a failed condition; a record the core never deletes
                // should not silently resolve to a skip.
                if self.item_exists(&update.item_id).await? {
                    Ok(UpdateOutcome::Conflict)
                } else {
                    Err(KeysweepError::RecordNotFound(update.item_id))
                }
            }
            Err(err) => Err(classify("update_item", err)),
        }
    }
}

/// Timestamp encoding used in the table: ISO-8601 with milliseconds, UTC.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn string_attr<'a>(item: &'a HashMap<String, AttributeValue>, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.as_str())
}

/// Decodes one table row into a [`KeyRecord`], validating presence and
/// timestamp format.
fn decode_record(item: &HashMap<String, AttributeValue>) -> Result<KeyRecord> {
    let item_id = string_attr(item, "itemID")
        .ok_or_else(|| KeysweepError::MalformedRecord {
            item: "<missing itemID>".to_string(),
            reason: "itemID attribute missing or not a string".to_string(),
        })?
        .to_string();

    let field = |name: &str| -> Result<String> {
        string_attr(item, name)
            .map(str::to_string)
            .ok_or_else(|| KeysweepError::MalformedRecord {
                item: item_id.clone(),
                reason: format!("{} attribute missing or not a string", name),
            })
    };

    let external_key_id = field("externalKeyID")?;
    let key_value = field("keyValue")?;
    let usage_plan_id = field("usagePlanID")?;
    let raw_ts = field("lastRotatedAt")?;

    let last_rotated_at = DateTime::parse_from_rfc3339(&raw_ts)
        .map_err(|e| KeysweepError::MalformedRecord {
            item: item_id.clone(),
            reason: format!("lastRotatedAt is not ISO-8601: {}", e),
        })?
        .with_timezone(&Utc);

    Ok(KeyRecord {
        item_id,
        external_key_id,
        key_value,
        usage_plan_id,
        last_rotated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> HashMap<String, AttributeValue> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect()
    }

    #[test]
    fn test_decode_record() {
        let item = row(&[
            ("itemID", "item-1"),
            ("externalKeyID", "key-1"),
            ("keyValue", "secret"),
            ("usagePlanID", "plan-1"),
            ("lastRotatedAt", "2026-01-15T08:30:00.000Z"),
        ]);

        let record = decode_record(&item).unwrap();
        assert_eq!(record.item_id, "item-1");
        assert_eq!(record.external_key_id, "key-1");
        assert_eq!(record.usage_plan_id, "plan-1");
        assert_eq!(record.last_rotated_at.to_rfc3339(), "2026-01-15T08:30:00+00:00");
    }

    #[test]
    fn test_decode_record_missing_field() {
        let item = row(&[
            ("itemID", "item-1"),
            ("externalKeyID", "key-1"),
            ("lastRotatedAt", "2026-01-15T08:30:00.000Z"),
        ]);

        let result = decode_record(&item);
        assert!(matches!(
            result,
            Err(KeysweepError::MalformedRecord { .. })
        ));
        assert!(result.unwrap_err().to_string().contains("keyValue"));
    }

    #[test]
    fn test_decode_record_bad_timestamp() {
        let item = row(&[
            ("itemID", "item-1"),
            ("externalKeyID", "key-1"),
            ("keyValue", "secret"),
            ("usagePlanID", "plan-1"),
            ("lastRotatedAt", "sometime last month"),
        ]);

        let result = decode_record(&item);
        assert!(matches!(
            result,
            Err(KeysweepError::MalformedRecord { .. })
        ));
        assert!(result.unwrap_err().to_string().contains("ISO-8601"));
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Utc::now();
        let encoded = encode_timestamp(ts);
        let parsed = DateTime::parse_from_rfc3339(&encoded).unwrap();
        // Millisecond precision survives the table encoding.
        assert_eq!(parsed.timestamp_millis(), ts.timestamp_millis());
    }
}
