use tokio::runtime::Runtime;
use tracing::{debug, error, info};

use super::{ObjectStore, StorageError, StorageResult};
use crate::config::S3StorageConfig;

/// S3-compatible bucket (AWS S3, MinIO, Cloudflare R2, ...).
///
/// The AWS SDK is async; a private current-thread runtime drives it so the
/// store can be used from synchronous code.
pub struct S3Store {
    config: S3StorageConfig,
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl S3Store {
    pub fn new(config: S3StorageConfig) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("S3 bucket name is empty".to_string()));
        }
        info!(bucket = %config.bucket, "Initializing S3 object storage");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = runtime.block_on(build_client(&config));

        Ok(Self { config, client, runtime })
    }
}

async fn build_client(config: &S3StorageConfig) -> aws_sdk_s3::Client {
    let mut sdk_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = &config.region {
        sdk_config_builder = sdk_config_builder.region(aws_config::Region::new(region.clone()));
    }

    if let (Some(access_key), Some(secret_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        let credentials = aws_credential_types::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "tripfriend-config",
        );
        sdk_config_builder = sdk_config_builder.credentials_provider(credentials);
    }

    let sdk_config = sdk_config_builder.load().await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.endpoint {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }
    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    aws_sdk_s3::Client::from_conf(s3_config_builder.build())
}

impl ObjectStore for S3Store {
    fn delete(&self, key: &str) -> StorageResult<()> {
        let object_key = self.config.object_key(key);
        debug!(key = %object_key, bucket = %self.config.bucket, "Deleting object from S3");

        self.runtime
            .block_on(
                self.client
                    .delete_object()
                    .bucket(&self.config.bucket)
                    .key(&object_key)
                    .send(),
            )
            .map_err(|e| {
                error!(error = %e, key = %object_key, "Failed to delete from S3");
                StorageError::S3(e.to_string())
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
