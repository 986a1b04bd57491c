use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;

use crate::error::StagingError;

/// Temporary drop point for uploaded invoice documents. The workflow issues
/// one presigned PUT per transaction; the object key is the transaction id.
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn presign_upload(&self, key: &str, expires_in: Duration)
        -> Result<String, StagingError>;
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StagingError>;
    async fn remove(&self, key: &str) -> Result<(), StagingError>;
}

pub struct S3StagingStore {
    client: aws_sdk_s3::Client,
    bucket_name: String,
}

impl S3StagingStore {
    pub fn new(client: aws_sdk_s3::Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
        }
    }
}

#[async_trait]
impl StagingStore for S3StagingStore {
    async fn presign_upload(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StagingError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StagingError::Sdk(Box::new(err)))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| StagingError::Sdk(Box::new(err)))?;

        Ok(presigned.uri().into())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StagingError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    return Err(StagingError::NotFound(key.to_string()));
                }
                return Err(StagingError::Sdk(Box::new(err)));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| StagingError::Sdk(Box::new(err)))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn remove(&self, key: &str) -> Result<(), StagingError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|err| StagingError::Sdk(Box::new(err)))?;

        Ok(())
    }
}
