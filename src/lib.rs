//! Invoice import workflow: upload authorization over a WebSocket channel,
//! staged S3 upload, validation, and status tracking in DynamoDB.

pub mod audit;
pub mod error;
pub mod invoice;
pub mod notification;
pub mod projector;
pub mod staging;
pub mod transaction;
pub mod util;
pub mod workflow;
pub mod ws;
