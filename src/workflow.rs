//! The transaction state machine: GENERATED -> RECEIVED -> PROCESSED, with
//! NON_VALID_INVOICE_NUMBER, CANCELLED and TIMEOUT as the failure exits.
//! Every transition reads the latest status from the store; races between
//! upload, cancellation and expiry resolve to whichever handler read first.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{AuditBus, InvoiceFailure};
use crate::error::{Error, StoreError};
use crate::invoice::{Invoice, InvoiceDocument, InvoiceStore};
use crate::staging::StagingStore;
use crate::transaction::{
    InvoiceTransaction, TransactionStatus, TransactionStore, TRANSACTION_PK,
};
use crate::util::epoch_millis;
use crate::ws::PushChannel;

/// Lifetime of the presigned upload URL.
const UPLOAD_URL_EXPIRES: Duration = Duration::from_secs(5 * 60);

/// A transaction that has not reached a terminal status by then is purged
/// by the table TTL, which surfaces as a TIMEOUT to the client.
const TRANSACTION_TTL_SECS: i64 = 2 * 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadAuthorization {
    url: String,
    expires: u64,
    transaction_id: String,
}

pub struct WorkflowEngine<T, C, S, I, A> {
    transactions: T,
    channel: C,
    staging: S,
    invoices: I,
    audit: A,
}

impl<T, C, S, I, A> WorkflowEngine<T, C, S, I, A>
where
    T: TransactionStore,
    C: PushChannel,
    S: StagingStore,
    I: InvoiceStore,
    A: AuditBus,
{
    pub fn new(transactions: T, channel: C, staging: S, invoices: I, audit: A) -> Self {
        Self {
            transactions,
            channel,
            staging,
            invoices,
            audit,
        }
    }

    /// Issues a fresh upload authorization to the requesting connection:
    /// a presigned PUT URL plus the transaction id tracking the attempt.
    pub async fn issue_authorization(
        &self,
        connection_id: &str,
        endpoint: &str,
        request_id: &str,
    ) -> Result<String, Error> {
        let key = Uuid::new_v4().to_string();
        let url = self.staging.presign_upload(&key, UPLOAD_URL_EXPIRES).await?;

        let timestamp = epoch_millis();
        let transaction = InvoiceTransaction {
            pk: TRANSACTION_PK.to_string(),
            sk: key.clone(),
            ttl: timestamp / 1000 + TRANSACTION_TTL_SECS,
            request_id: request_id.to_string(),
            transaction_status: TransactionStatus::Generated,
            timestamp,
            expires_in: UPLOAD_URL_EXPIRES.as_secs(),
            connection_id: connection_id.to_string(),
            endpoint: endpoint.to_string(),
        };
        self.transactions.create(&transaction).await?;

        let authorization = UploadAuthorization {
            url,
            expires: UPLOAD_URL_EXPIRES.as_secs(),
            transaction_id: key.clone(),
        };
        self.channel
            .send(connection_id, serde_json::to_string(&authorization)?)
            .await?;

        info!("Upload authorized - TransactionId: {}", key);
        Ok(key)
    }

    /// Reacts to an object landing in the staging bucket under `key`.
    pub async fn upload_observed(&self, key: &str) -> Result<(), Error> {
        let transaction = match self.transactions.get(key).await {
            Ok(transaction) => transaction,
            Err(StoreError::NotFound(_)) => {
                error!("Invoice transaction not found - TransactionId: {}", key);
                return Err(Error::TransactionNotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        if transaction.transaction_status != TransactionStatus::Generated {
            // Cancellation or a redelivered notification got here first.
            self.channel
                .send_status(
                    &transaction.connection_id,
                    key,
                    transaction.transaction_status,
                )
                .await?;
            error!(
                "Non valid transaction status: {} - TransactionId: {}",
                transaction.transaction_status, key
            );
            return Ok(());
        }

        let (pushed, updated) = tokio::join!(
            self.channel
                .send_status(&transaction.connection_id, key, TransactionStatus::Received),
            self.transactions
                .update_status(key, TransactionStatus::Received),
        );
        first_error([pushed.map_err(Error::from), updated.map_err(Error::from)])?;

        let body = self.staging.fetch(key).await?;
        let document: InvoiceDocument = serde_json::from_slice(&body)?;

        if let Some(invoice_number) = document.valid_invoice_number() {
            let invoice = Invoice::from_document(&document, invoice_number, key, epoch_millis());
            let (created, updated, pushed, removed) = tokio::join!(
                self.invoices.create(&invoice),
                self.transactions
                    .update_status(key, TransactionStatus::Processed),
                self.channel.send_status(
                    &transaction.connection_id,
                    key,
                    TransactionStatus::Processed
                ),
                self.staging.remove(key),
            );
            first_error([
                created.map_err(Error::from),
                updated.map_err(Error::from),
                pushed.map_err(Error::from),
                removed.map_err(Error::from),
            ])?;
            info!("Invoice imported - TransactionId: {}", key);
        } else {
            error!(
                "Invoice import failed - non valid invoice number - TransactionId: {}",
                key
            );
            let failure = InvoiceFailure::no_invoice_number(key, &document.customer_name);
            let (updated, pushed, published) = tokio::join!(
                self.transactions
                    .update_status(key, TransactionStatus::NonValidInvoiceNumber),
                self.channel.send_status(
                    &transaction.connection_id,
                    key,
                    TransactionStatus::NonValidInvoiceNumber
                ),
                self.audit.publish(&failure),
            );
            first_error([
                updated.map_err(Error::from),
                pushed.map_err(Error::from),
                published.map_err(Error::from),
            ])?;
            self.channel.disconnect(&transaction.connection_id).await?;
        }

        Ok(())
    }

    /// Explicit client cancellation. Only a GENERATED transaction can be
    /// cancelled; any other outcome is reported back as the current status.
    /// The session is closed regardless of the outcome.
    pub async fn cancel(&self, transaction_id: &str, connection_id: &str) -> Result<(), Error> {
        match self.transactions.get(transaction_id).await {
            Ok(transaction)
                if transaction.transaction_status == TransactionStatus::Generated =>
            {
                let (pushed, updated) = tokio::join!(
                    self.channel.send_status(
                        connection_id,
                        transaction_id,
                        TransactionStatus::Cancelled
                    ),
                    self.transactions
                        .update_status(transaction_id, TransactionStatus::Cancelled),
                );
                first_error([pushed.map_err(Error::from), updated.map_err(Error::from)])?;
                info!("Import cancelled - TransactionId: {}", transaction_id);
            }
            Ok(transaction) => {
                self.channel
                    .send_status(
                        connection_id,
                        transaction_id,
                        transaction.transaction_status,
                    )
                    .await?;
                error!(
                    "Can't cancel an ongoing process - TransactionId: {}",
                    transaction_id
                );
            }
            Err(StoreError::NotFound(_)) => {
                error!(
                    "Invoice transaction not found - TransactionId: {}",
                    transaction_id
                );
                self.channel
                    .send_status(connection_id, transaction_id, TransactionStatus::NotFound)
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.channel.disconnect(connection_id).await?;
        Ok(())
    }
}

/// Awaits of a concurrently dispatched effect group land here: log every
/// failed sibling, surface the first one, never roll anything back.
fn first_error<const N: usize>(results: [Result<(), Error>; N]) -> Result<(), Error> {
    let mut first = None;
    for result in results {
        if let Err(err) = result {
            error!("Side effect failed: {}", err);
            if first.is_none() {
                first = Some(err);
            }
        }
    }

    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
