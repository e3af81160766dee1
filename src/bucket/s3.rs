use super::{ObjectInfo, ObjectStore};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    /// Build a client from the default AWS credential chain.
    ///
    /// A custom endpoint switches to path-style addressing for MinIO/LocalStack.
    pub async fn connect(bucket: &str, region: &str, endpoint_url: Option<&str>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(S3Client::from_conf(builder.build()), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            let resp = request
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| Error::Storage(format!(
                    "Failed to list s3://{}/{}: {}",
                    self.bucket,
                    prefix,
                    DisplayErrorContext(&e)
                )))?;

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                // Folder placeholders
                if key.ends_with('/') {
                    continue;
                }
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    etag: object.e_tag().map(|t| t.trim_matches('"').to_string()),
                });
            }

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        tracing::debug!("Listed {} objects in s3://{}", objects.len(), self.bucket);
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Storage(format!(
                "Failed to read s3://{}/{}: {}",
                self.bucket,
                key,
                DisplayErrorContext(&e)
            )))?;

        let data = resp.body.collect().await.map_err(|e| {
            Error::Storage(format!("Failed to download s3://{}/{}: {}", self.bucket, key, e))
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Storage(format!(
                "Failed to write s3://{}/{}: {}",
                self.bucket,
                key,
                DisplayErrorContext(&e)
            )))?;

        tracing::debug!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::Credentials;
    use httpmock::prelude::*;

    fn store(server: &MockServer) -> S3Store {
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(server.base_url())
            .force_path_style(true)
            .build();
        S3Store::new(S3Client::from_conf(config), "docs-bucket")
    }

    fn first_page(req: &HttpMockRequest) -> bool {
        req.query_params
            .as_ref()
            .is_none_or(|params| params.iter().all(|(name, _)| name != "continuation-token"))
    }

    fn listing(keys: &[(&str, u64)], next: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|(key, size)| {
                format!(
                    "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                     <ETag>&quot;etag-{}&quot;</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                    key, size, size
                )
            })
            .collect();
        let truncation = match next {
            Some(token) => format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
                token
            ),
            None => "<IsTruncated>false</IsTruncated>".to_string(),
        };
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>docs-bucket</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{}{}\
             </ListBucketResult>",
            keys.len(),
            truncation,
            contents
        )
    }

    #[tokio::test]
    async fn test_list_follows_continuation_and_skips_folders() {
        let server = MockServer::start_async().await;
        let page_one = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("docs-bucket")
                    .query_param("list-type", "2")
                    .matches(first_page);
                then.status(200)
                    .header("content-type", "application/xml")
                    .body(listing(&[("papers/", 0), ("ml.txt", 12)], Some("page-2")));
            })
            .await;
        let page_two = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("docs-bucket")
                    .query_param("list-type", "2")
                    .query_param("continuation-token", "page-2");
                then.status(200)
                    .header("content-type", "application/xml")
                    .body(listing(&[("aws.md", 30)], None));
            })
            .await;

        let objects = store(&server).list("").await.unwrap();

        page_one.assert_async().await;
        page_two.assert_async().await;
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["aws.md", "ml.txt"]);
        assert_eq!(objects[1].size, 12);
        assert_eq!(objects[1].etag.as_deref(), Some("etag-12"));
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("docs-bucket/ml.txt");
                then.status(200).body("Machine learning");
            })
            .await;

        assert_eq!(store(&server).get("ml.txt").await.unwrap(), b"Machine learning");
    }

    #[tokio::test]
    async fn test_get_access_denied_is_storage_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("docs-bucket/secret.pdf");
                then.status(403)
                    .header("content-type", "application/xml")
                    .body(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                    );
            })
            .await;

        let err = store(&server).get("secret.pdf").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("s3://docs-bucket/secret.pdf"));
    }
}
