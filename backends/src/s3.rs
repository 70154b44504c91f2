use crate::backend::Backend;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Credentials, timeout::TimeoutConfig},
    error::DisplayErrorContext,
};
use pvc_plumber_core::{BackendKind, CheckResult, Error, Result};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct S3Config {
    /// `host:port` or a full URL. Without a scheme, `secure` picks http or https.
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub timeout: Duration,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl S3Config {
    pub fn endpoint_url(&self) -> Result<String> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config("S3 endpoint is empty".to_string()));
        }

        let url = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, endpoint)
        };

        let parsed = reqwest::Url::parse(&url)
            .map_err(|e| Error::Config(format!("invalid S3 endpoint {:?}: {}", self.endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(Error::Config(format!("invalid S3 endpoint {:?}", self.endpoint)));
        }

        Ok(url.trim_end_matches('/').to_string())
    }
}

/// The single listing call the S3 backend needs from an object store.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Returns up to `max_keys` keys found under `prefix`.
    async fn list_keys(&self, bucket: &str, prefix: &str, max_keys: i32) -> Result<Vec<String>>;
}

#[async_trait]
impl ObjectLister for Client {
    async fn list_keys(&self, bucket: &str, prefix: &str, max_keys: i32) -> Result<Vec<String>> {
        let response = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| Error::Backend(DisplayErrorContext(&e).to_string()))?;

        Ok(response
            .contents()
            .iter()
            .map(|object| object.key().unwrap_or_default().to_string())
            .collect())
    }
}

pub struct S3Backend {
    lister: Box<dyn ObjectLister>,
    bucket: String,
}

impl S3Backend {
    pub fn new(config: &S3Config) -> Result<Self> {
        let endpoint_url = config.endpoint_url()?;

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pvc-plumber",
        );

        let s3_config = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(DEFAULT_REGION))
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout)
                    .build(),
            )
            .build();

        Ok(Self::with_lister(
            config.bucket.clone(),
            Client::from_conf(s3_config),
        ))
    }

    pub fn with_lister<L>(bucket: String, lister: L) -> Self
    where
        L: ObjectLister + 'static,
    {
        Self {
            lister: Box::new(lister),
            bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn prefix(namespace: &str, pvc: &str) -> String {
        format!("{}/{}/", namespace, pvc)
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn check_backup_exists(&self, namespace: &str, pvc: &str) -> CheckResult {
        let prefix = Self::prefix(namespace, pvc);
        debug!(bucket = %self.bucket, prefix = %prefix, "listing objects");

        // One key is enough to answer the question.
        match self.lister.list_keys(&self.bucket, &prefix, 1).await {
            Ok(keys) => CheckResult::new(namespace, pvc, BackendKind::S3, !keys.is_empty()),
            Err(e) => {
                error!(bucket = %self.bucket, prefix = %prefix, error = %e, "s3 listing failed");
                CheckResult::failed(
                    namespace,
                    pvc,
                    BackendKind::S3,
                    format!("failed to list objects: {}", e),
                )
            }
        }
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeLister {
        outcome: std::result::Result<Vec<String>, String>,
        calls: Mutex<Vec<(String, String, i32)>>,
    }

    impl FakeLister {
        fn returning(keys: &[&str]) -> Self {
            Self {
                outcome: Ok(keys.iter().map(|k| k.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                outcome: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectLister for std::sync::Arc<FakeLister> {
        async fn list_keys(&self, bucket: &str, prefix: &str, max_keys: i32) -> Result<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((bucket.to_string(), prefix.to_string(), max_keys));
            self.outcome.clone().map_err(Error::Backend)
        }
    }

    fn config(endpoint: &str, secure: bool) -> S3Config {
        S3Config {
            endpoint: endpoint.to_string(),
            bucket: "test-bucket".to_string(),
            access_key: "accesskey".to_string(),
            secret_key: "secretkey".to_string(),
            secure,
            timeout: Duration::from_secs(3),
        }
    }

    #[tokio::test]
    async fn test_new_backend() {
        let backend = S3Backend::new(&config("localhost:9000", false)).unwrap();
        assert_eq!(backend.bucket(), "test-bucket");
        assert_eq!(backend.backend_kind(), BackendKind::S3);
    }

    #[tokio::test]
    async fn test_new_rejects_bad_endpoint() {
        assert!(S3Backend::new(&config("", false)).is_err());
        assert!(S3Backend::new(&config("ftp://minio:9000", false)).is_err());
        assert!(S3Backend::new(&config("http://", false)).is_err());
    }

    #[test]
    fn test_endpoint_url_scheme() {
        assert_eq!(
            config("minio.local:9000", false).endpoint_url().unwrap(),
            "http://minio.local:9000"
        );
        assert_eq!(
            config("minio.local:9000", true).endpoint_url().unwrap(),
            "https://minio.local:9000"
        );
        assert_eq!(
            config("https://s3.example.com/", false).endpoint_url().unwrap(),
            "https://s3.example.com"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config("localhost:9000", false));
        assert!(!rendered.contains("secretkey"));
    }

    #[tokio::test]
    async fn test_no_objects_means_no_backup() {
        let lister = std::sync::Arc::new(FakeLister::returning(&[]));
        let backend = S3Backend::with_lister("backups".to_string(), lister.clone());

        let result = backend.check_backup_exists("ns", "pvc").await;

        assert!(!result.exists);
        assert_eq!(result.backend, BackendKind::S3);
        assert_eq!(result.error, None);
        assert_eq!(
            lister.calls.lock().unwrap().as_slice(),
            &[("backups".to_string(), "ns/pvc/".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_one_object_means_backup_exists() {
        let lister = std::sync::Arc::new(FakeLister::returning(&["karakeep/data-pvc/snapshot-1"]));
        let backend = S3Backend::with_lister("backups".to_string(), lister);

        let result = backend.check_backup_exists("karakeep", "data-pvc").await;

        assert!(result.exists);
        assert_eq!(result.namespace, "karakeep");
        assert_eq!(result.pvc, "data-pvc");
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_listing_error_is_reported() {
        let lister = std::sync::Arc::new(FakeLister::failing("connection refused"));
        let backend = S3Backend::with_lister("backups".to_string(), lister);

        let result = backend.check_backup_exists("ns", "pvc").await;

        assert!(!result.exists);
        assert_eq!(result.backend, BackendKind::S3);
        let message = result.error.unwrap();
        assert!(message.starts_with("failed to list objects"));
        assert!(message.contains("connection refused"));
    }
}
