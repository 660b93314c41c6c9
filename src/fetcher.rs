use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::{Client, StatusCode};
use scraper::Html;
use tracing::{info, warn};

use crate::parser::extract;
use crate::store;

const PAGE_ENDPOINT: &str = "https://share.jiemo.net/NSeries/grammarShare";

/// Statuses worth an automatic retry; anything else fails the attempt.
const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
];

/// Transport policy, fixed at startup and passed to every fetch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: PAGE_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(25),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Fetch run outcome. `saved` counts actual successes; `attempted` is the
/// number of ids processed, trailing failure streak included.
pub struct FetchStats {
    pub start_id: u32,
    pub attempted: usize,
    pub saved: usize,
}

pub fn build_client(config: &FetchConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .build()
        .context("failed to build HTTP client")
}

fn page_url(base_url: &str, id: u32) -> String {
    format!("{base_url}?version=2260&isReview=0&at=12&dt=1&uc=store_huawei&id={id}&share=1")
}

/// Fresh browser-shaped headers for one request. Accept-Language is pinned
/// Japanese-first; only the user-agent varies.
fn random_headers<R: Rng>(rng: &mut R) -> HeaderMap {
    let ua = USER_AGENTS.choose(rng).copied().unwrap_or(USER_AGENTS[0]);
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(ua));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.3"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

/// Uniform pacing jitter in `[min_delay, max_delay]`.
fn random_delay<R: Rng>(rng: &mut R, config: &FetchConfig) -> Duration {
    Duration::from_secs_f64(
        rng.gen_range(config.min_delay.as_secs_f64()..=config.max_delay.as_secs_f64()),
    )
}

/// Drive the fetch loop from `start_id` until `max_consecutive_fails`
/// failures in a row. Every id gets one attempt (plus transport retries);
/// per-page errors are logged and counted, never fatal.
pub async fn run<R: Rng>(
    client: &Client,
    config: &FetchConfig,
    out_dir: &Path,
    start_id: u32,
    max_consecutive_fails: u32,
    rng: &mut R,
) -> Result<FetchStats> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut consecutive_fails = 0u32;
    let mut current_id = start_id;
    let mut saved = 0usize;

    while consecutive_fails < max_consecutive_fails {
        tokio::time::sleep(random_delay(rng, config)).await;

        match fetch_and_save(client, config, out_dir, current_id, rng).await {
            Ok(path) => {
                info!("Saved {}", path.display());
                consecutive_fails = 0;
                saved += 1;
            }
            Err(e) => {
                consecutive_fails += 1;
                warn!(
                    "id {} failed ({}/{}): {:#}",
                    current_id, consecutive_fails, max_consecutive_fails, e
                );
            }
        }
        current_id += 1;
    }

    Ok(FetchStats {
        start_id,
        attempted: (current_id - start_id) as usize,
        saved,
    })
}

/// Fetch one page and persist its content container. Fails when the request
/// errors out, the status is non-2xx after retries, or the page has no
/// `div.grammar-content`.
async fn fetch_and_save<R: Rng>(
    client: &Client,
    config: &FetchConfig,
    out_dir: &Path,
    id: u32,
    rng: &mut R,
) -> Result<PathBuf> {
    let response = get_with_retry(client, config, id, rng).await?;
    let body = response.text().await.context("failed to read response body")?;

    let doc = Html::parse_document(&body);
    let fragment = extract::content_root(&doc)
        .map(|el| el.html())
        .ok_or_else(|| anyhow!("content container not found"))?;

    store::save_fragment(out_dir, id, &fragment)
}

async fn get_with_retry<R: Rng>(
    client: &Client,
    config: &FetchConfig,
    id: u32,
    rng: &mut R,
) -> Result<reqwest::Response> {
    let url = page_url(&config.base_url, id);
    let mut attempt = 0u32;
    loop {
        let response = client
            .get(&url)
            .headers(random_headers(rng))
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if RETRY_STATUSES.contains(&status) && attempt < config.max_retries {
            let backoff = config.base_backoff * 2u32.pow(attempt);
            warn!(
                "HTTP {} for id {} (attempt {}/{}), backing off {:.1}s",
                status,
                id,
                attempt + 1,
                config.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        return Ok(response.error_for_status()?);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CONTAINER_PAGE: &str = "<html><body><main>\
        <div class=\"grammar-content\"><h1><span class=\"grammar\">文法</span></h1>\
        <p>〜わけだ</p><p>Body text.</p></div></main></body></html>";
    const BARE_PAGE: &str = "<html><body><p>nothing here</p></body></html>";

    fn test_config(base_url: String) -> FetchConfig {
        FetchConfig {
            base_url,
            base_backoff: Duration::from_millis(1),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..FetchConfig::default()
        }
    }

    /// Serve scripted (status, body) responses in connection order, then 404s.
    async fn spawn_server(script: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/page", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script.get(n).copied().unwrap_or((404, ""));
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = sock.write_all(response.as_bytes()).await;
            }
        });

        (base_url, hits)
    }

    #[tokio::test]
    async fn stops_at_failure_threshold() {
        let (base_url, hits) = spawn_server(vec![]).await;
        let config = test_config(base_url);
        let client = build_client(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let stats = run(&client, &config, dir.path(), 5, 3, &mut rng).await.unwrap();
        assert_eq!(stats.start_id, 5);
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.saved, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn success_resets_the_streak() {
        // id 1: no container; id 2: saved; ids 3-4: 404s exhaust the limit
        let (base_url, _) = spawn_server(vec![(200, BARE_PAGE), (200, CONTAINER_PAGE)]).await;
        let config = test_config(base_url);
        let client = build_client(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let stats = run(&client, &config, dir.path(), 1, 2, &mut rng).await.unwrap();
        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.saved, 1);

        let saved = fs::read_to_string(dir.path().join("0002.html")).unwrap();
        assert!(saved.starts_with("<div class=\"grammar-content\""));
        assert!(saved.contains("Body text."));
        assert!(!dir.path().join("0001.html").exists());
    }

    #[tokio::test]
    async fn retries_transient_statuses() {
        let (base_url, hits) = spawn_server(vec![(503, ""), (200, CONTAINER_PAGE)]).await;
        let config = test_config(base_url);
        let client = build_client(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let stats = run(&client, &config, dir.path(), 1, 1, &mut rng).await.unwrap();
        // id 1 succeeds on the second attempt; id 2 hits the 404 fallback
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.attempted, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(dir.path().join("0001.html").exists());
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = FetchConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let d = random_delay(&mut rng, &config);
            assert!(d >= config.min_delay && d <= config.max_delay);
        }
    }

    #[test]
    fn headers_are_browser_shaped() {
        let mut rng = StdRng::seed_from_u64(42);
        let headers = random_headers(&mut rng);
        let ua = headers.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(USER_AGENTS.contains(&ua));
        let lang = headers.get(ACCEPT_LANGUAGE).unwrap().to_str().unwrap();
        assert!(lang.starts_with("ja"));
        assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let a = random_headers(&mut StdRng::seed_from_u64(9));
        let b = random_headers(&mut StdRng::seed_from_u64(9));
        assert_eq!(a.get(USER_AGENT), b.get(USER_AGENT));
    }

    #[test]
    fn page_url_substitutes_id() {
        let url = page_url(PAGE_ENDPOINT, 42);
        assert!(url.starts_with(PAGE_ENDPOINT));
        assert!(url.contains("id=42"));
        assert!(url.contains("version=2260"));
    }
}
