use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use newsreel_types::{FetchError, FetchResult, RemoteLocator};
use tracing::debug;

use crate::storage::ObjectStorage;

/// Object storage reached over HTTP(S).
///
/// `store://` and `gs://` locators resolve against the configured endpoint
/// as `{endpoint}/{bucket}/{path}`; `http(s)://` locators are already URLs.
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(endpoint: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        Self { client, endpoint }
    }

    fn resolve_url(&self, locator: &RemoteLocator) -> FetchResult<String> {
        let Some((scheme, rest)) = locator.scheme_and_rest() else {
            return Err(FetchError::resolution(
                locator.as_str(),
                "locator is not scheme-qualified",
            ));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(locator.as_str().to_string()),
            "store" | "gs" => {
                let endpoint = self.endpoint.as_deref().ok_or_else(|| {
                    FetchError::resolution(locator.as_str(), "no storage endpoint configured")
                })?;
                let rest = rest.trim_start_matches('/');
                if !rest.contains('/') {
                    return Err(FetchError::resolution(
                        locator.as_str(),
                        "locator must name a bucket and an object path",
                    ));
                }
                Ok(format!("{endpoint}/{rest}"))
            }
            other => Err(FetchError::resolution(
                locator.as_str(),
                format!("unsupported scheme '{other}'"),
            )),
        }
    }

    async fn fetch_bytes(&self, url: &str, max_bytes: u64) -> FetchResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::network(url, err.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::network(
                url,
                format!("server returned status {}", response.status().as_u16()),
            ));
        }

        let declared = response.content_length();
        check_declared_length(declared, max_bytes)?;

        let capacity = declared.unwrap_or(0).min(max_bytes) as usize;
        let mut bytes = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| FetchError::network(url, err.to_string()))?;
            append_within_limit(&mut bytes, &chunk, max_bytes)?;
        }

        debug!(url, bytes = bytes.len(), "download finished");
        Ok(bytes)
    }
}

fn check_declared_length(declared: Option<u64>, max_bytes: u64) -> FetchResult<()> {
    match declared {
        Some(total) if total > max_bytes => Err(FetchError::Oversize {
            limit: max_bytes,
            observed: total,
        }),
        _ => Ok(()),
    }
}

/// Append one streamed chunk, failing once the running total passes the
/// ceiling. Servers may omit or understate Content-Length.
fn append_within_limit(bytes: &mut Vec<u8>, chunk: &[u8], max_bytes: u64) -> FetchResult<()> {
    let observed = (bytes.len() + chunk.len()) as u64;
    if observed > max_bytes {
        return Err(FetchError::Oversize {
            limit: max_bytes,
            observed,
        });
    }
    bytes.extend_from_slice(chunk);
    Ok(())
}

impl ObjectStorage for HttpObjectStorage {
    fn resolve<'a>(&'a self, locator: &'a RemoteLocator) -> BoxFuture<'a, FetchResult<String>> {
        Box::pin(async move { self.resolve_url(locator) })
    }

    fn download<'a>(&'a self, url: &'a str, max_bytes: u64) -> BoxFuture<'a, FetchResult<Vec<u8>>> {
        Box::pin(self.fetch_bytes(url, max_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> HttpObjectStorage {
        HttpObjectStorage::new(Some("https://media.example.com/".to_string()))
    }

    #[test]
    fn store_locators_resolve_against_endpoint() {
        let url = storage()
            .resolve_url(&RemoteLocator::new("store://bucket/videos/a.mp4"))
            .unwrap();
        assert_eq!(url, "https://media.example.com/bucket/videos/a.mp4");

        let url = storage()
            .resolve_url(&RemoteLocator::new("gs://bucket/b.mp4"))
            .unwrap();
        assert_eq!(url, "https://media.example.com/bucket/b.mp4");
    }

    #[test]
    fn http_locators_pass_through() {
        let locator = RemoteLocator::new("https://cdn.example.com/x.mp4");
        assert_eq!(storage().resolve_url(&locator).unwrap(), locator.as_str());
    }

    #[test]
    fn resolution_failures() {
        let cases = ["ftp://host/x.mp4", "no-scheme", "store://bucket-only"];
        for case in cases {
            let err = storage()
                .resolve_url(&RemoteLocator::new(case))
                .unwrap_err();
            assert!(matches!(err, FetchError::Resolution { .. }), "{case}");
        }

        let err = HttpObjectStorage::new(None)
            .resolve_url(&RemoteLocator::new("store://bucket/a.mp4"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Resolution { .. }));
    }

    fn collect(chunks: &[&[u8]], max_bytes: u64) -> FetchResult<Vec<u8>> {
        let mut bytes = Vec::new();
        for chunk in chunks {
            append_within_limit(&mut bytes, chunk, max_bytes)?;
        }
        Ok(bytes)
    }

    #[test]
    fn declared_length_over_ceiling_is_rejected_up_front() {
        assert!(check_declared_length(None, 10).is_ok());
        assert!(check_declared_length(Some(10), 10).is_ok());
        let err = check_declared_length(Some(11), 10).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Oversize {
                limit: 10,
                observed: 11
            }
        ));
    }

    #[test]
    fn streamed_chunks_up_to_the_ceiling_are_kept() {
        let bytes = collect(&[b"abcd", b"efgh", b"ij"], 10).unwrap();
        assert_eq!(bytes, b"abcdefghij");
    }

    #[test]
    fn running_total_over_ceiling_fails_mid_stream() {
        let err = collect(&[b"abcd", b"efgh", b"ijk", b"never read"], 10).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Oversize {
                limit: 10,
                observed: 11
            }
        ));
    }
}
