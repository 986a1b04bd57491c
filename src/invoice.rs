use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::to_item;

use crate::error::StoreError;

pub const INVOICE_PK_PREFIX: &str = "#invoice_";

/// An invoice number shorter than this is rejected.
pub const MIN_INVOICE_NUMBER_LEN: usize = 6;

/// The document a client PUTs to the staging bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    #[serde(default)]
    pub invoice_number: Option<String>,
    pub customer_name: String,
    pub total_value: f64,
    pub product_id: String,
    pub quantity: i64,
}

impl InvoiceDocument {
    /// Returns the invoice number only if it passes the validity rule.
    pub fn valid_invoice_number(&self) -> Option<&str> {
        self.invoice_number
            .as_deref()
            .filter(|number| number.len() >= MIN_INVOICE_NUMBER_LEN)
    }
}

/// Finalized invoice line item, keyed by customer and invoice number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub pk: String,
    pub sk: String,
    pub ttl: i64,
    pub total_value: f64,
    pub product_id: String,
    pub quantity: i64,
    pub transaction_id: String,
    pub created_at: i64,
}

impl Invoice {
    pub fn from_document(
        document: &InvoiceDocument,
        invoice_number: &str,
        transaction_id: &str,
        created_at: i64,
    ) -> Self {
        Self {
            pk: format!("{}{}", INVOICE_PK_PREFIX, document.customer_name),
            sk: invoice_number.to_string(),
            ttl: 0,
            total_value: document.total_value,
            product_id: document.product_id.clone(),
            quantity: document.quantity,
            transaction_id: transaction_id.to_string(),
            created_at,
        }
    }

    pub fn customer_name(&self) -> &str {
        self.pk.strip_prefix(INVOICE_PK_PREFIX).unwrap_or(&self.pk)
    }
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create(&self, invoice: &Invoice) -> Result<(), StoreError>;
}

pub struct DynamoInvoiceStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoInvoiceStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl InvoiceStore for DynamoInvoiceStore {
    async fn create(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let item = to_item(invoice)?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| StoreError::Sdk(Box::new(err)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(invoice_number: Option<&str>) -> InvoiceDocument {
        InvoiceDocument {
            invoice_number: invoice_number.map(String::from),
            customer_name: "acme".to_string(),
            total_value: 100.0,
            product_id: "P1".to_string(),
            quantity: 2,
        }
    }

    #[test]
    fn accepts_six_character_invoice_number() {
        assert_eq!(document(Some("INV123")).valid_invoice_number(), Some("INV123"));
        assert_eq!(
            document(Some("INV12345")).valid_invoice_number(),
            Some("INV12345")
        );
    }

    #[test]
    fn rejects_short_missing_or_empty_invoice_number() {
        assert_eq!(document(Some("INV12")).valid_invoice_number(), None);
        assert_eq!(document(Some("")).valid_invoice_number(), None);
        assert_eq!(document(None).valid_invoice_number(), None);
    }

    #[test]
    fn invoice_is_keyed_by_customer_and_number() {
        let invoice = Invoice::from_document(&document(Some("INV12345")), "INV12345", "tx-1", 42);
        assert_eq!(invoice.pk, "#invoice_acme");
        assert_eq!(invoice.sk, "INV12345");
        assert_eq!(invoice.customer_name(), "acme");
        assert_eq!(invoice.transaction_id, "tx-1");
        assert_eq!(invoice.ttl, 0);
    }

    #[test]
    fn parses_uploaded_document() {
        let raw = r#"{"invoiceNumber":"INV12345","customerName":"acme","totalValue":100,"productId":"P1","quantity":2}"#;
        let document: InvoiceDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(document.valid_invoice_number(), Some("INV12345"));
        assert_eq!(document.total_value, 100.0);
    }
}
