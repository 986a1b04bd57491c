use aws_config::BehaviorVersion;
use aws_lambda_events::event::dynamodb::Event as DynamoDbEvent;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::error;

use invoice_import::notification::Notification;
use invoice_import::projector::{DynamoEventStore, EventProjector};
use invoice_import::ws::WsGateway;

const EVENTS_TABLE_DEFAULT: &str = "events";

type Projector = EventProjector<WsGateway, DynamoEventStore>;

async fn process_event(
    event: LambdaEvent<DynamoDbEvent>,
    projector: &Projector,
) -> Result<(), LambdaError> {
    for record in &event.payload.records {
        match Notification::from_stream_record(record) {
            Ok(Some(notification)) => {
                if let Err(err) = projector.project(notification).await {
                    error!("Stream record failed: {}", err);
                }
            }
            Ok(None) => {}
            Err(err) => error!("Skipping malformed record: {}", err),
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

    let table_name = std::env::var("EVENTS_DDB").unwrap_or(EVENTS_TABLE_DEFAULT.into());
    let ws_endpoint =
        std::env::var("INVOICE_WSAPI_ENDPOINT").expect("INVOICE_WSAPI_ENDPOINT not set");

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let projector = EventProjector::new(
        WsGateway::new(&config, &ws_endpoint),
        DynamoEventStore::new(aws_sdk_dynamodb::Client::new(&config), &table_name),
    );

    run(service_fn(|event: LambdaEvent<DynamoDbEvent>| async {
        process_event(event, &projector).await
    }))
    .await
}
