//! Derives secondary effects from table stream changes: an event record for
//! every finalized invoice, and the timeout notification for transactions
//! that expired before completing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::to_item;
use tracing::{error, info, warn};

use crate::error::{ChannelError, Error, StoreError};
use crate::invoice::{Invoice, INVOICE_PK_PREFIX};
use crate::notification::Notification;
use crate::transaction::{InvoiceTransaction, TransactionStatus};
use crate::util::epoch_millis;
use crate::ws::PushChannel;

pub const INVOICE_CREATED: &str = "INVOICE_CREATED";

/// Derived events only feed short-lived read models.
const EVENT_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEvent {
    pub pk: String,
    pub sk: String,
    pub ttl: i64,
    pub customer_name: String,
    pub created_at: i64,
    pub event_type: String,
    pub info: InvoiceEventInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEventInfo {
    pub transaction_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create(&self, event: &InvoiceEvent) -> Result<(), StoreError>;
}

pub struct DynamoEventStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoEventStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl EventStore for DynamoEventStore {
    async fn create(&self, event: &InvoiceEvent) -> Result<(), StoreError> {
        let item = to_item(event)?;
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

pub struct EventProjector<C, E> {
    channel: C,
    events: E,
}

impl<C, E> EventProjector<C, E>
where
    C: PushChannel,
    E: EventStore,
{
    pub fn new(channel: C, events: E) -> Self {
        Self { channel, events }
    }

    pub async fn project(&self, notification: Notification) -> Result<(), Error> {
        match notification {
            Notification::TransactionInserted { transaction_id } => {
                info!(
                    "Invoice transaction received - TransactionId: {}",
                    transaction_id
                );
                Ok(())
            }
            Notification::InvoiceInserted(invoice) => self.invoice_created(invoice).await,
            Notification::TransactionRemoved(transaction) => {
                self.transaction_expired(transaction).await
            }
            other => Err(Error::MalformedEvent(format!(
                "not a stream notification: {:?}",
                other
            ))),
        }
    }

    async fn invoice_created(&self, invoice: Invoice) -> Result<(), Error> {
        let created_at = epoch_millis();
        let event = InvoiceEvent {
            pk: format!("{}{}", INVOICE_PK_PREFIX, invoice.sk),
            sk: format!("{}#{}", INVOICE_CREATED, created_at),
            ttl: created_at / 1000 + EVENT_TTL_SECS,
            customer_name: invoice.customer_name().to_string(),
            created_at,
            event_type: INVOICE_CREATED.to_string(),
            info: InvoiceEventInfo {
                transaction_id: invoice.transaction_id.clone(),
                product_id: invoice.product_id.clone(),
                quantity: invoice.quantity,
            },
        };
        self.events.create(&event).await?;

        info!("Invoice event created - InvoiceNumber: {}", invoice.sk);
        Ok(())
    }

    /// The table TTL removed a transaction record. A PROCESSED transaction
    /// is normal cleanup; anything else never completed and the owning
    /// connection is told so and closed.
    async fn transaction_expired(&self, transaction: InvoiceTransaction) -> Result<(), Error> {
        if transaction.transaction_status == TransactionStatus::Processed {
            info!("Invoice processed - TransactionId: {}", transaction.sk);
            return Ok(());
        }

        error!(
            "Invoice import failed - Status: {} - TransactionId: {}",
            transaction.transaction_status, transaction.sk
        );
        match self
            .channel
            .send_status(
                &transaction.connection_id,
                &transaction.sk,
                TransactionStatus::Timeout,
            )
            .await
        {
            Ok(()) => {}
            Err(ChannelError::Gone(connection_id)) => {
                warn!("Connection already gone: {}", connection_id);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        self.channel.disconnect(&transaction.connection_id).await?;
        Ok(())
    }
}
