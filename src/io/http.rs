use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// A remote resource fetched over HTTP(S).
///
/// A HEAD request learns the length and whether the server honors byte
/// ranges; streams can then start at any offset without re-downloading the
/// prefix. Servers without range support are streamed from the start.
pub struct UrlSource {
    client: Client,
    url: String,
    length: Option<u64>,
    accept_ranges: bool,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl UrlSource {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let resp = client.head(&url).send()?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!("HEAD {url} failed with status {}", resp.status())));
        }

        let accept_ranges = resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));
        let length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        log::debug!("{url}: length={length:?} ranges={accept_ranges}");

        Ok(Self {
            client,
            url,
            length,
            accept_ranges,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Length advertised by the server, if any.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn accepts_ranges(&self) -> bool {
        self.accept_ranges
    }

    /// Total body bytes requested so far, as advertised by responses.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Open a body stream, starting at `offset` when ranges are supported.
    ///
    /// Returns the stream with the offset it actually starts at.
    pub fn open(&self, offset: u64) -> Result<(Response, u64)> {
        let ranged = offset > 0 && self.accept_ranges;
        let mut retry_count = 0;
        loop {
            let mut request = self.client.get(&self.url);
            if ranged {
                request = request.header(RANGE, format!("bytes={offset}-"));
            }
            match request.send() {
                Ok(resp) => {
                    let expected = if ranged { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
                    if resp.status() != expected {
                        return Err(Error::Http(format!(
                            "GET {} failed with status {}",
                            self.url,
                            resp.status()
                        )));
                    }
                    if let Some(len) = resp.content_length() {
                        self.transferred_bytes.fetch_add(len, Ordering::Relaxed);
                    }
                    return Ok((resp, if ranged { offset } else { 0 }));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(Error::Http(format!("max retries exceeded for {}", self.url)));
                    }
                    log::warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
