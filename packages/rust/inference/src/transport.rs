//! Plain-text POST to the model server.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use tracing::debug;
use url::Url;

use newsreader_shared::{NewsReaderError, Result};

/// User-Agent string for inference requests.
const USER_AGENT: &str = concat!("newsreader/", env!("CARGO_PKG_VERSION"));

/// HTTP client whose overall request timeout is `timeout`.
pub fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| NewsReaderError::Network(format!("failed to build HTTP client: {e}")))
}

/// POST `body` as UTF-8 text and return the raw response body.
///
/// Anything but `200 OK` is an error.
pub async fn post(client: &Client, url: &Url, body: String) -> Result<Vec<u8>> {
    debug!(%url, len = body.len(), "posting to model server");

    let response = client
        .post(url.as_str())
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::ACCEPT_CHARSET, "utf-8")
        .body(body)
        .send()
        .await
        .map_err(|e| NewsReaderError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(NewsReaderError::Network(format!(
            "could not post request to url={url}, status={status}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| NewsReaderError::Network(format!("{url}: body read failed: {e}")))?;
    Ok(bytes.to_vec())
}
