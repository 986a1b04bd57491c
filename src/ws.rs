//! Push channel over the API Gateway Management API: server-initiated
//! messages to, and forced closure of, a live WebSocket connection.

use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::transaction::TransactionStatus;

/// Status push sent to the owning connection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub transaction_id: String,
    pub status: TransactionStatus,
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, connection_id: &str, payload: String) -> Result<(), ChannelError>;

    /// Force-close the connection. Closing an already-gone connection is
    /// not an error.
    async fn disconnect(&self, connection_id: &str) -> Result<(), ChannelError>;

    async fn send_status(
        &self,
        connection_id: &str,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<(), ChannelError> {
        let message = StatusMessage {
            transaction_id: transaction_id.to_string(),
            status,
        };
        self.send(connection_id, serde_json::to_string(&message)?)
            .await
    }
}

/// The management API speaks HTTPS against the WebSocket stage endpoint.
pub fn management_endpoint(ws_endpoint: &str) -> String {
    match ws_endpoint.strip_prefix("wss://") {
        Some(host) => format!("https://{}", host),
        None => ws_endpoint.to_string(),
    }
}

pub struct WsGateway {
    client: aws_sdk_apigatewaymanagement::Client,
    endpoint: String,
}

impl WsGateway {
    pub fn new(config: &aws_config::SdkConfig, ws_endpoint: &str) -> Self {
        let endpoint = management_endpoint(ws_endpoint);
        let client_config = aws_sdk_apigatewaymanagement::config::Builder::from(config)
            .endpoint_url(endpoint.clone())
            .build();

        Self {
            client: aws_sdk_apigatewaymanagement::Client::from_conf(client_config),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushChannel for WsGateway {
    async fn send(&self, connection_id: &str, payload: String) -> Result<(), ChannelError> {
        match self
            .client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(payload.into_bytes()))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_gone_exception() {
                    Err(ChannelError::Gone(connection_id.to_string()))
                } else {
                    Err(ChannelError::Sdk(Box::new(err)))
                }
            }
        }
    }

    async fn disconnect(&self, connection_id: &str) -> Result<(), ChannelError> {
        match self
            .client
            .delete_connection()
            .connection_id(connection_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_gone_exception() {
                    Ok(())
                } else {
                    Err(ChannelError::Sdk(Box::new(err)))
                }
            }
        }
    }
}
