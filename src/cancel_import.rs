use aws_config::BehaviorVersion;
use aws_lambda_events::encodings::Body;
use aws_lambda_events::event::apigw::{
    ApiGatewayProxyResponse, ApiGatewayWebsocketProxyRequest,
};
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::info;

use invoice_import::audit::EventBridgeAuditBus;
use invoice_import::invoice::DynamoInvoiceStore;
use invoice_import::notification::Notification;
use invoice_import::staging::S3StagingStore;
use invoice_import::transaction::DynamoTransactionStore;
use invoice_import::workflow::WorkflowEngine;
use invoice_import::ws::WsGateway;

const INVOICES_TABLE_DEFAULT: &str = "invoices";
const BUCKET_NAME_DEFAULT: &str = "invoice-staging";
const AUDIT_BUS_DEFAULT: &str = "audit-events";

type Engine = WorkflowEngine<
    DynamoTransactionStore,
    WsGateway,
    S3StagingStore,
    DynamoInvoiceStore,
    EventBridgeAuditBus,
>;

async fn process_request(
    event: LambdaEvent<ApiGatewayWebsocketProxyRequest>,
    engine: &Engine,
) -> Result<ApiGatewayProxyResponse, LambdaError> {
    let request_id = event.context.request_id.clone();

    match Notification::from_ws_request(&event.payload, &request_id)? {
        Notification::CancelRequest {
            connection_id,
            transaction_id,
        } => {
            info!(
                "ConnectionId: {} - Lambda RequestId: {}",
                connection_id, request_id
            );
            engine.cancel(&transaction_id, &connection_id).await?;
        }
        other => return Err(format!("unexpected notification: {:?}", other).into()),
    }

    Ok(ApiGatewayProxyResponse {
        status_code: 200,
        body: Some(Body::Text("OK".to_string())),
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .without_time() // CloudWatch will add the ingestion time
        .with_target(false)
        .init();

    let table_name = std::env::var("INVOICES_DDB").unwrap_or(INVOICES_TABLE_DEFAULT.into());
    let bucket_name = std::env::var("BUCKET_NAME").unwrap_or(BUCKET_NAME_DEFAULT.into());
    let bus_name = std::env::var("AUDIT_BUS_NAME").unwrap_or(AUDIT_BUS_DEFAULT.into());
    let ws_endpoint =
        std::env::var("INVOICE_WSAPI_ENDPOINT").expect("INVOICE_WSAPI_ENDPOINT not set");

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let dynamo_client = aws_sdk_dynamodb::Client::new(&config);
    let gateway = WsGateway::new(&config, &ws_endpoint);

    let engine = WorkflowEngine::new(
        DynamoTransactionStore::new(dynamo_client.clone(), &table_name),
        gateway,
        S3StagingStore::new(aws_sdk_s3::Client::new(&config), &bucket_name),
        DynamoInvoiceStore::new(dynamo_client, &table_name),
        EventBridgeAuditBus::new(aws_sdk_eventbridge::Client::new(&config), &bus_name),
    );

    run(service_fn(
        |event: LambdaEvent<ApiGatewayWebsocketProxyRequest>| async {
            process_request(event, &engine).await
        },
    ))
    .await
}
