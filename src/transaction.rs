use std::fmt;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};

use crate::error::StoreError;

/// Partition key shared by every transaction record; the sort key is the
/// transaction id.
pub const TRANSACTION_PK: &str = "#transaction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Generated,
    Received,
    Processed,
    NonValidInvoiceNumber,
    Cancelled,
    NotFound,
    Timeout,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Generated => "GENERATED",
            TransactionStatus::Received => "RECEIVED",
            TransactionStatus::Processed => "PROCESSED",
            TransactionStatus::NonValidInvoiceNumber => "NON_VALID_INVOICE_NUMBER",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::NotFound => "NOT_FOUND",
            TransactionStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invoice-upload attempt. Only `transaction_status` is ever mutated
/// after creation; the record is purged by the table TTL at `ttl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTransaction {
    pub pk: String,
    pub sk: String,
    pub ttl: i64,
    pub request_id: String,
    pub transaction_status: TransactionStatus,
    pub timestamp: i64,
    pub expires_in: u64,
    pub connection_id: String,
    pub endpoint: String,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, transaction: &InvoiceTransaction) -> Result<(), StoreError>;
    async fn get(&self, transaction_id: &str) -> Result<InvoiceTransaction, StoreError>;
    async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<(), StoreError>;
}

pub struct DynamoTransactionStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoTransactionStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl TransactionStore for DynamoTransactionStore {
    async fn create(&self, transaction: &InvoiceTransaction) -> Result<(), StoreError> {
        let item = to_item(transaction)?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(pk) AND attribute_not_exists(sk)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => match err.err() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    Err(StoreError::AlreadyExists(transaction.sk.clone()))
                }
                _ => Err(StoreError::Sdk(Box::new(SdkError::ServiceError(err)))),
            },
            Err(err) => Err(StoreError::Sdk(Box::new(err))),
        }
    }

    async fn get(&self, transaction_id: &str) -> Result<InvoiceTransaction, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(TRANSACTION_PK.to_string()))
            .key("sk", AttributeValue::S(transaction_id.to_string()))
            .send()
            .await
            .map_err(|err| StoreError::Sdk(Box::new(err)))?;

        let item = output
            .item
            .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))?;
        Ok(from_item(item)?)
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(TRANSACTION_PK.to_string()))
            .key("sk", AttributeValue::S(transaction_id.to_string()))
            .update_expression("SET transactionStatus = :status")
            .expression_attribute_values(":status", to_attribute_value(status)?)
            .condition_expression("attribute_exists(pk)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => match err.err() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    Err(StoreError::NotFound(transaction_id.to_string()))
                }
                _ => Err(StoreError::Sdk(Box::new(SdkError::ServiceError(err)))),
            },
            Err(err) => Err(StoreError::Sdk(Box::new(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_match_display() {
        let statuses = [
            TransactionStatus::Generated,
            TransactionStatus::Received,
            TransactionStatus::Processed,
            TransactionStatus::NonValidInvoiceNumber,
            TransactionStatus::Cancelled,
            TransactionStatus::NotFound,
            TransactionStatus::Timeout,
        ];

        for status in statuses {
            let encoded = serde_json::to_string(&status).unwrap();
            assert_eq!(encoded, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn status_decodes_from_wire_name() {
        let status: TransactionStatus =
            serde_json::from_str("\"NON_VALID_INVOICE_NUMBER\"").unwrap();
        assert_eq!(status, TransactionStatus::NonValidInvoiceNumber);
    }
}
