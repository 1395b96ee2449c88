#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use migration_engine::{FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher};

/// Serves canned responses by URL and counts requests.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, (Vec<u8>, String)>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.responses
            .insert(url.to_string(), (body.into(), content_type.to_string()));
        self
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.with(url, body, "text/html; charset=utf-8")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());
        let (bytes, content_type) = self
            .responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), "404 Not Found"))?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: Some(content_type),
                byte_len: bytes.len() as u64,
                attempts: 1,
            },
            bytes,
        })
    }
}
