use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::{error, info};

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

async fn process_event(
    event: LambdaEvent<S3Event>,
    engine: &Engine,
) -> Result<(), LambdaError> {
    for record in &event.payload.records {
        let notification = match Notification::from_s3_record(record) {
            Ok(notification) => notification,
            Err(err) => {
                error!("Skipping malformed record: {}", err);
                continue;
            }
        };

        if let Notification::ObjectCreated { key } = notification {
            info!("Invoice upload received - TransactionId: {}", key);
            // A failed record is only logged: redelivery and dead-letter
            // routing are handled by the platform, not here.
            if let Err(err) = engine.upload_observed(&key).await {
                error!("Invoice import failed - TransactionId: {} - {}", key, err);
            }
        }
    }

    Ok(())
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

    run(service_fn(|event: LambdaEvent<S3Event>| async {
        process_event(event, &engine).await
    }))
    .await
}
