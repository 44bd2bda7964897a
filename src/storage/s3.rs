use std::time::Duration;

use actix_web::web::Bytes;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::{ResumeFetch, ResumeKey, ResumeStorage, StorageError, RESUME_PREFIX};

/// Resume objects in an S3-compatible bucket, addressed as `s3://<bucket>/<key>`
pub struct S3Storage {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            presign_expiry,
        }
    }

    /// Build a client for AWS, or for MinIO and friends when `endpoint` is set
    pub async fn connect(
        bucket: &str,
        endpoint: Option<&str>,
        region: &str,
        credentials: Option<(&str, &str)>,
        presign_expiry: Duration,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()));

        if let Some((access_key_id, secret_access_key)) = credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "job-tracker-static",
            ));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        // Custom endpoints (MinIO) generally need path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        info!("Using S3 resume storage in bucket {}", bucket);
        Self::new(Client::from_conf(s3_config), bucket, presign_expiry)
    }

    fn locator_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn key_of<'a>(&self, locator: &'a str) -> Option<&'a str> {
        locator
            .strip_prefix("s3://")?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
            .filter(|key| !key.is_empty())
    }

    fn require_key<'a>(&self, locator: &'a str) -> Result<&'a str, StorageError> {
        self.key_of(locator)
            .ok_or_else(|| StorageError::Rejected(locator.to_string()))
    }
}

#[async_trait]
impl ResumeStorage for S3Storage {
    fn backend(&self) -> &'static str {
        "s3"
    }

    fn manages(&self, locator: &str) -> bool {
        self.key_of(locator).is_some()
    }

    async fn put(&self, key: &ResumeKey, data: Bytes) -> Result<String, StorageError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key.key)
            .body(ByteStream::from(data))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("put_object failed: {}", DisplayErrorContext(&e))))?;

        let locator = self.locator_for(&key.key);
        debug!("Uploaded {} bytes to {}", size, locator);
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        // DeleteObject succeeds for keys that no longer exist
        let key = self.require_key(locator)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("delete_object failed: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn fetch(&self, locator: &str) -> Result<ResumeFetch, StorageError> {
        let key = self.require_key(locator)?;

        // A presigned URL is handed out blindly, so check the object is still there
        if let Err(e) = self.client.head_object().bucket(&self.bucket).key(key).send().await {
            if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                return Err(StorageError::Missing(locator.to_string()));
            }
            return Err(StorageError::S3(format!("head_object failed: {}", DisplayErrorContext(&e))));
        }

        let presigning = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| StorageError::S3(format!("invalid presign expiry: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_type("application/pdf")
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::S3(format!("presign failed: {}", DisplayErrorContext(&e))))?;

        Ok(ResumeFetch::Redirect(request.uri().to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut locators = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(format!("{}/", RESUME_PREFIX))
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::S3(format!("list_objects_v2 failed: {}", DisplayErrorContext(&e))))?;

            locators.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(|key| self.locator_for(key)),
            );

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(locators)
    }
}
