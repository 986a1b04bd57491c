use async_trait::async_trait;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;

use crate::error::AuditError;

pub const FAIL_NO_INVOICE_NUMBER: &str = "FAIL_NO_INVOICE_NUMBER";

const AUDIT_SOURCE: &str = "app.invoice";
const AUDIT_DETAIL_TYPE: &str = "invoice";

/// Failure condition routed to the external audit subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFailure {
    pub error_detail: String,
    pub invoice_key: String,
    pub customer_name: String,
}

impl InvoiceFailure {
    pub fn no_invoice_number(invoice_key: &str, customer_name: &str) -> Self {
        Self {
            error_detail: FAIL_NO_INVOICE_NUMBER.to_string(),
            invoice_key: invoice_key.to_string(),
            customer_name: customer_name.to_string(),
        }
    }
}

#[async_trait]
pub trait AuditBus: Send + Sync {
    async fn publish(&self, failure: &InvoiceFailure) -> Result<(), AuditError>;
}

pub struct EventBridgeAuditBus {
    client: aws_sdk_eventbridge::Client,
    bus_name: String,
}

impl EventBridgeAuditBus {
    pub fn new(client: aws_sdk_eventbridge::Client, bus_name: impl Into<String>) -> Self {
        Self {
            client,
            bus_name: bus_name.into(),
        }
    }
}

#[async_trait]
impl AuditBus for EventBridgeAuditBus {
    async fn publish(&self, failure: &InvoiceFailure) -> Result<(), AuditError> {
        let detail = serde_json::json!({
            "errorDetail": failure.error_detail,
            "info": {
                "invoiceKey": failure.invoice_key,
                "customerName": failure.customer_name,
            },
        });

        let entry = PutEventsRequestEntry::builder()
            .source(AUDIT_SOURCE)
            .detail_type(AUDIT_DETAIL_TYPE)
            .detail(detail.to_string())
            .event_bus_name(&self.bus_name)
            .build();

        self.client
            .put_events()
            .entries(entry)
            .send()
            .await
            .map_err(|err| AuditError::Sdk(Box::new(err)))?;

        Ok(())
    }
}
