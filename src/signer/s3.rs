// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! S3 signing backend on `aws-sdk-s3`.
//!
//! Presigning is local to the SDK client; only
//! [`ObjectSigner::delete_object`] talks to the store.
//!
//! ## Credentials
//!
//! | Configuration | Source |
//! |---------------|--------|
//! | access key + secret (+ optional session token) | static credentials |
//! | neither set | default AWS provider chain (env, profile, web identity, IMDS) |
//!
//! A custom endpoint (MinIO, R2, ...) switches to path-style addressing.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;
use url::Url;

use super::{ObjectSigner, Operation, SignerError, MAX_PRESIGN_EXPIRY};

/// Provider name attached to statically configured credentials.
const CREDENTIALS_PROVIDER: &str = "teamboard-grants";

/// Bucket coordinates and optional static credentials.
#[derive(Clone, Default)]
pub struct S3SignerConfig {
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Session token of temporary (STS) credentials
    pub session_token: Option<String>,
    /// Custom S3-compatible endpoint; enables path-style addressing.
    pub endpoint: Option<Url>,
}

impl fmt::Debug for S3SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3SignerConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .finish()
    }
}

impl S3SignerConfig {
    /// Static credentials, when both halves of the key pair are configured.
    fn static_credentials(&self) -> Result<Option<Credentials>, SignerError> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(Credentials::new(
                access_key,
                secret_key,
                self.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER,
            ))),
            (None, None) => Ok(None),
            _ => Err(SignerError::Credentials(
                "access key and secret must be set together".to_string(),
            )),
        }
    }

    fn checked_endpoint(&self) -> Result<Option<&Url>, SignerError> {
        match &self.endpoint {
            Some(endpoint) if !matches!(endpoint.scheme(), "http" | "https") => Err(
                SignerError::Endpoint(format!("unsupported scheme in {endpoint}")),
            ),
            endpoint => Ok(endpoint.as_ref()),
        }
    }

    /// Client settings on top of the shared SDK configuration.
    fn client_config(&self, base: aws_sdk_s3::config::Builder) -> Result<aws_sdk_s3::Config, SignerError> {
        let mut builder = base.region(Region::new(self.region.clone()));
        if let Some(credentials) = self.static_credentials()? {
            builder = builder.credentials_provider(credentials);
        }
        if let Some(endpoint) = self.checked_endpoint()? {
            builder = builder
                .endpoint_url(endpoint.as_str().trim_end_matches('/'))
                .force_path_style(true);
        }
        Ok(builder.build())
    }
}

/// Presigns object URLs and deletes objects through the S3 API.
#[derive(Debug, Clone)]
pub struct S3Signer {
    client: Client,
    bucket: String,
}

impl S3Signer {
    /// Build a signer, resolving credentials through the AWS provider chain
    /// unless static ones are configured.
    pub async fn connect(config: S3SignerConfig) -> Result<Self, SignerError> {
        config.checked_endpoint()?;
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let client_config = config.client_config(aws_sdk_s3::config::Builder::from(&sdk_config))?;
        Ok(Self::with_client(Client::from_conf(client_config), config.bucket))
    }

    /// Build a signer without touching the environment. Static credentials
    /// are required.
    pub fn offline(config: S3SignerConfig) -> Result<Self, SignerError> {
        if config.static_credentials()?.is_none() {
            return Err(SignerError::Credentials(
                "static credentials required".to_string(),
            ));
        }
        let base = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        let client_config = config.client_config(base)?;
        Ok(Self::with_client(Client::from_conf(client_config), config.bucket))
    }

    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn presigning_config(ttl: Duration) -> Result<PresigningConfig, SignerError> {
    if ttl.as_secs() == 0 || ttl > MAX_PRESIGN_EXPIRY {
        return Err(SignerError::ExpiryOutOfRange(ttl.as_secs()));
    }
    PresigningConfig::expires_in(ttl).map_err(|_| SignerError::ExpiryOutOfRange(ttl.as_secs()))
}

#[async_trait]
impl ObjectSigner for S3Signer {
    async fn sign(
        &self,
        object_key: &str,
        operation: Operation,
        ttl: Duration,
    ) -> Result<String, SignerError> {
        let presigning = presigning_config(ttl)?;
        let request = match operation {
            Operation::Read => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(object_key)
                .presigned(presigning)
                .await
                .map_err(|e| SignerError::Request(DisplayErrorContext(&e).to_string()))?,
            Operation::Write => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(object_key)
                .presigned(presigning)
                .await
                .map_err(|e| SignerError::Request(DisplayErrorContext(&e).to_string()))?,
            Operation::Delete => self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(object_key)
                .presigned(presigning)
                .await
                .map_err(|e| SignerError::Request(DisplayErrorContext(&e).to_string()))?,
        };
        Ok(request.uri().to_string())
    }

    async fn delete_object(&self, object_key: &str) -> Result<(), SignerError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| match e.raw_response() {
                Some(raw) => SignerError::Status {
                    status: raw.status().as_u16(),
                    key: object_key.to_string(),
                },
                None => SignerError::Request(DisplayErrorContext(&e).to_string()),
            })?;

        debug!(bucket = %self.bucket, key = %object_key, "Object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> S3SignerConfig {
        S3SignerConfig {
            bucket: "team-assets".into(),
            region: "us-east-1".into(),
            access_key: Some("AKIDEXAMPLE".into()),
            secret_key: Some("wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".into()),
            session_token: None,
            endpoint: Some(Url::parse("http://localhost:9000").unwrap()),
        }
    }

    fn query_value(url: &str, name: &str) -> Option<String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[tokio::test]
    async fn read_url_is_path_style_with_expiry() {
        let signer = S3Signer::offline(local_config()).unwrap();
        let url = signer
            .sign("acme/icon.png", Operation::Read, Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(
            url.starts_with("http://localhost:9000/team-assets/acme/icon.png?"),
            "{url}"
        );
        assert_eq!(query_value(&url, "X-Amz-Expires").as_deref(), Some("3600"));
        assert_eq!(
            query_value(&url, "X-Amz-Algorithm").as_deref(),
            Some("AWS4-HMAC-SHA256")
        );
        assert!(query_value(&url, "X-Amz-Signature").is_some());
    }

    #[tokio::test]
    async fn operations_sign_differently() {
        let signer = S3Signer::offline(local_config()).unwrap();
        let ttl = Duration::from_secs(600);

        let read = signer.sign("acme/icon.png", Operation::Read, ttl).await.unwrap();
        let write = signer.sign("acme/icon.png", Operation::Write, ttl).await.unwrap();

        assert_ne!(
            query_value(&read, "X-Amz-Signature"),
            query_value(&write, "X-Amz-Signature")
        );
    }

    #[tokio::test]
    async fn session_token_is_carried() {
        let config = S3SignerConfig {
            session_token: Some("FwoGZXIvYXdzEXAMPLE".into()),
            ..local_config()
        };
        let signer = S3Signer::offline(config).unwrap();
        let url = signer
            .sign("acme/icon.png", Operation::Read, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            query_value(&url, "X-Amz-Security-Token").as_deref(),
            Some("FwoGZXIvYXdzEXAMPLE")
        );
    }

    #[tokio::test]
    async fn expiry_must_be_presignable() {
        let signer = S3Signer::offline(local_config()).unwrap();
        for ttl in [Duration::ZERO, MAX_PRESIGN_EXPIRY + Duration::from_secs(1)] {
            let result = signer.sign("acme/icon.png", Operation::Read, ttl).await;
            assert!(matches!(result, Err(SignerError::ExpiryOutOfRange(_))), "{ttl:?}");
        }
    }

    #[test]
    fn half_configured_credentials_are_rejected() {
        let config = S3SignerConfig {
            secret_key: None,
            ..local_config()
        };
        assert!(matches!(
            S3Signer::offline(config),
            Err(SignerError::Credentials(_))
        ));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let config = S3SignerConfig {
            endpoint: Some(Url::parse("ftp://files.internal").unwrap()),
            ..local_config()
        };
        assert!(matches!(
            S3Signer::offline(config),
            Err(SignerError::Endpoint(_))
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = S3SignerConfig {
            session_token: Some("token-value".into()),
            ..local_config()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("token-value"));
        assert!(debug.contains("AKIDEXAMPLE"));
    }
}
