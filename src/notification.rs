//! Typed view over the loosely-structured events that trigger the workflow:
//! WebSocket route invocations, staging-bucket object creations, and table
//! stream changes. Anything malformed fails here and is never dispatched.

use aws_lambda_events::event::apigw::ApiGatewayWebsocketProxyRequest;
use aws_lambda_events::event::dynamodb::EventRecord;
use aws_lambda_events::event::s3::S3EventRecord;
use serde::Deserialize;

use crate::error::Error;
use crate::invoice::Invoice;
use crate::transaction::{InvoiceTransaction, TRANSACTION_PK};

pub const ROUTE_GET_IMPORT_URL: &str = "getImportUrl";
pub const ROUTE_CANCEL_IMPORT: &str = "cancelImport";

#[derive(Debug)]
pub enum Notification {
    AuthorizationRequest {
        connection_id: String,
        request_id: String,
    },
    CancelRequest {
        connection_id: String,
        transaction_id: String,
    },
    ObjectCreated {
        key: String,
    },
    TransactionInserted {
        transaction_id: String,
    },
    InvoiceInserted(Invoice),
    TransactionRemoved(InvoiceTransaction),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct ItemKeys {
    pk: String,
    sk: String,
}

impl Notification {
    pub fn from_ws_request(
        request: &ApiGatewayWebsocketProxyRequest,
        request_id: &str,
    ) -> Result<Self, Error> {
        let connection_id = request
            .request_context
            .connection_id
            .clone()
            .ok_or_else(|| Error::MalformedEvent("missing connection id".to_string()))?;

        match request.request_context.route_key.as_deref() {
            Some(ROUTE_GET_IMPORT_URL) => Ok(Notification::AuthorizationRequest {
                connection_id,
                request_id: request_id.to_string(),
            }),
            Some(ROUTE_CANCEL_IMPORT) => {
                let body = request.body.as_deref().ok_or_else(|| {
                    Error::MalformedEvent("cancel request without body".to_string())
                })?;
                let body: CancelBody = serde_json::from_str(body)?;
                Ok(Notification::CancelRequest {
                    connection_id,
                    transaction_id: body.transaction_id,
                })
            }
            other => Err(Error::MalformedEvent(format!(
                "unsupported route: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    pub fn from_s3_record(record: &S3EventRecord) -> Result<Self, Error> {
        let key = record
            .s3
            .object
            .key
            .clone()
            .ok_or_else(|| Error::MalformedEvent("object record without key".to_string()))?;

        Ok(Notification::ObjectCreated { key })
    }

    /// Classifies a table stream record. `Ok(None)` means the record is of
    /// no interest here (modifications, removals of non-transaction items).
    pub fn from_stream_record(record: &EventRecord) -> Result<Option<Self>, Error> {
        match record.event_name.as_str() {
            "INSERT" => {
                let keys: ItemKeys =
                    serde_dynamo::from_item(record.change.new_image.clone())?;
                if keys.pk == TRANSACTION_PK {
                    Ok(Some(Notification::TransactionInserted {
                        transaction_id: keys.sk,
                    }))
                } else {
                    let invoice: Invoice =
                        serde_dynamo::from_item(record.change.new_image.clone())?;
                    Ok(Some(Notification::InvoiceInserted(invoice)))
                }
            }
            "REMOVE" => {
                let keys: ItemKeys =
                    serde_dynamo::from_item(record.change.old_image.clone())?;
                if keys.pk == TRANSACTION_PK {
                    let transaction: InvoiceTransaction =
                        serde_dynamo::from_item(record.change.old_image.clone())?;
                    Ok(Some(Notification::TransactionRemoved(transaction)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use aws_lambda_events::event::dynamodb::StreamRecord;
    use serde_dynamo::AttributeValue;

    use super::*;
    use crate::transaction::TransactionStatus;

    fn ws_request(
        route_key: Option<&str>,
        connection_id: Option<&str>,
        body: Option<&str>,
    ) -> ApiGatewayWebsocketProxyRequest {
        let mut request = ApiGatewayWebsocketProxyRequest::default();
        request.request_context.route_key = route_key.map(String::from);
        request.request_context.connection_id = connection_id.map(String::from);
        request.body = body.map(String::from);
        request
    }

    fn transaction_image(status: &str) -> serde_dynamo::Item {
        let mut image: HashMap<String, AttributeValue> = HashMap::new();
        image.insert("pk".to_string(), AttributeValue::S(TRANSACTION_PK.to_string()));
        image.insert("sk".to_string(), AttributeValue::S("tx-1".to_string()));
        image.insert("ttl".to_string(), AttributeValue::N("1700000120".to_string()));
        image.insert("requestId".to_string(), AttributeValue::S("req-1".to_string()));
        image.insert(
            "transactionStatus".to_string(),
            AttributeValue::S(status.to_string()),
        );
        image.insert(
            "timestamp".to_string(),
            AttributeValue::N("1700000000000".to_string()),
        );
        image.insert("expiresIn".to_string(), AttributeValue::N("300".to_string()));
        image.insert(
            "connectionId".to_string(),
            AttributeValue::S("conn-1".to_string()),
        );
        image.insert(
            "endpoint".to_string(),
            AttributeValue::S("https://ws.example.com/prod".to_string()),
        );
        image.into()
    }

    fn invoice_image() -> serde_dynamo::Item {
        let mut image: HashMap<String, AttributeValue> = HashMap::new();
        image.insert(
            "pk".to_string(),
            AttributeValue::S("#invoice_acme".to_string()),
        );
        image.insert("sk".to_string(), AttributeValue::S("INV12345".to_string()));
        image.insert("ttl".to_string(), AttributeValue::N("0".to_string()));
        image.insert("totalValue".to_string(), AttributeValue::N("100".to_string()));
        image.insert("productId".to_string(), AttributeValue::S("P1".to_string()));
        image.insert("quantity".to_string(), AttributeValue::N("2".to_string()));
        image.insert(
            "transactionId".to_string(),
            AttributeValue::S("tx-1".to_string()),
        );
        image.insert(
            "createdAt".to_string(),
            AttributeValue::N("1700000000000".to_string()),
        );
        image.into()
    }

    fn default_stream_record() -> StreamRecord {
        StreamRecord {
            approximate_creation_date_time: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            keys: serde_dynamo::Item::from(HashMap::<String, AttributeValue>::new()),
            new_image: serde_dynamo::Item::from(HashMap::<String, AttributeValue>::new()),
            old_image: serde_dynamo::Item::from(HashMap::<String, AttributeValue>::new()),
            sequence_number: None,
            size_bytes: 0,
            stream_view_type: None,
        }
    }

    fn stream_record(event_name: &str, change: StreamRecord) -> EventRecord {
        EventRecord {
            aws_region: String::new(),
            change,
            event_id: String::new(),
            event_name: event_name.to_string(),
            event_source: None,
            event_version: None,
            event_source_arn: None,
            user_identity: None,
            record_format: None,
            table_name: None,
        }
    }

    #[test]
    fn parses_authorization_request() {
        let request = ws_request(Some(ROUTE_GET_IMPORT_URL), Some("conn-1"), None);
        let notification = Notification::from_ws_request(&request, "req-1").unwrap();
        match notification {
            Notification::AuthorizationRequest {
                connection_id,
                request_id,
            } => {
                assert_eq!(connection_id, "conn-1");
                assert_eq!(request_id, "req-1");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn parses_cancel_request_body() {
        let request = ws_request(
            Some(ROUTE_CANCEL_IMPORT),
            Some("conn-1"),
            Some(r#"{"transactionId":"tx-1"}"#),
        );
        let notification = Notification::from_ws_request(&request, "req-1").unwrap();
        match notification {
            Notification::CancelRequest {
                connection_id,
                transaction_id,
            } => {
                assert_eq!(connection_id, "conn-1");
                assert_eq!(transaction_id, "tx-1");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn rejects_cancel_request_without_body() {
        let request = ws_request(Some(ROUTE_CANCEL_IMPORT), Some("conn-1"), None);
        assert!(Notification::from_ws_request(&request, "req-1").is_err());
    }

    #[test]
    fn rejects_missing_connection_id() {
        let request = ws_request(Some(ROUTE_GET_IMPORT_URL), None, None);
        assert!(Notification::from_ws_request(&request, "req-1").is_err());
    }

    #[test]
    fn rejects_unknown_route() {
        let request = ws_request(Some("sendMessage"), Some("conn-1"), None);
        assert!(Notification::from_ws_request(&request, "req-1").is_err());
    }

    #[test]
    fn classifies_transaction_insert() {
        let record = stream_record(
            "INSERT",
            StreamRecord {
                new_image: transaction_image("GENERATED"),
                ..default_stream_record()
            },
        );
        match Notification::from_stream_record(&record).unwrap() {
            Some(Notification::TransactionInserted { transaction_id }) => {
                assert_eq!(transaction_id, "tx-1");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn classifies_invoice_insert() {
        let record = stream_record(
            "INSERT",
            StreamRecord {
                new_image: invoice_image(),
                ..default_stream_record()
            },
        );
        match Notification::from_stream_record(&record).unwrap() {
            Some(Notification::InvoiceInserted(invoice)) => {
                assert_eq!(invoice.sk, "INV12345");
                assert_eq!(invoice.customer_name(), "acme");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn classifies_transaction_removal_with_old_status() {
        let record = stream_record(
            "REMOVE",
            StreamRecord {
                old_image: transaction_image("RECEIVED"),
                ..default_stream_record()
            },
        );
        match Notification::from_stream_record(&record).unwrap() {
            Some(Notification::TransactionRemoved(transaction)) => {
                assert_eq!(transaction.sk, "tx-1");
                assert_eq!(transaction.transaction_status, TransactionStatus::Received);
                assert_eq!(transaction.connection_id, "conn-1");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn ignores_modifications_and_invoice_removals() {
        let modify = stream_record(
            "MODIFY",
            StreamRecord {
                new_image: transaction_image("RECEIVED"),
                old_image: transaction_image("GENERATED"),
                ..default_stream_record()
            },
        );
        assert!(Notification::from_stream_record(&modify).unwrap().is_none());

        let invoice_removal = stream_record(
            "REMOVE",
            StreamRecord {
                old_image: invoice_image(),
                ..default_stream_record()
            },
        );
        assert!(Notification::from_stream_record(&invoice_removal)
            .unwrap()
            .is_none());
    }
}
