use std::{sync::OnceLock, time::Duration};

use reqwest::header::{HeaderName, CONTENT_TYPE};

use crate::{api::Problem, error::Error};

pub(crate) type ReqResult<T> = std::result::Result<T, Problem>;

/// Response bodies are never read past this size.
pub(crate) const MAX_BODY_SIZE: usize = 1024 * 1024;

pub(crate) fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("acme-certifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default()
    })
}

pub(crate) async fn req_get(url: &str) -> eyre::Result<reqwest::Response> {
    log::trace!("GET {url}");
    Ok(http_client().get(url).send().await?)
}

pub(crate) async fn req_head(url: &str) -> eyre::Result<reqwest::Response> {
    log::trace!("HEAD {url}");
    Ok(http_client().head(url).send().await?)
}

pub(crate) async fn req_post(url: &str, body: String) -> eyre::Result<reqwest::Response> {
    log::trace!("POST {url} {body}");

    Ok(http_client()
        .post(url)
        .header(CONTENT_TYPE, "application/jose+json")
        .body(body)
        .send()
        .await?)
}

pub(crate) async fn req_handle_error(res: reqwest::Response) -> ReqResult<reqwest::Response> {
    // ok responses pass through
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();

    let is_problem = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/problem+json"));

    let body = req_safe_read_body(res).await;

    let problem = if is_problem {
        // if we were sent a problem+json, deserialize it
        serde_json::from_str(&body).unwrap_or_else(|err| Problem {
            _type: "problemJsonFail".to_owned(),
            detail: Some(format!(
                "Failed to deserialize application/problem+json ({err}) body: {body}"
            )),
            status: Some(status.as_u16()),
            subproblems: None,
        })
    } else {
        Problem {
            _type: "httpReqError".to_owned(),
            detail: Some(format!("{status} body: {body}")),
            status: Some(status.as_u16()),
            subproblems: None,
        }
    };

    Err(problem)
}

pub(crate) fn req_expect_header(res: &reqwest::Response, name: &str) -> ReqResult<String> {
    res.headers()
        .get(name)
        .and_then(|val| val.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or_else(|| Problem {
            _type: format!("Missing header: {name}"),
            ..Default::default()
        })
}

/// Collects the targets of all `Link` headers with the given relation.
pub(crate) fn req_links(res: &reqwest::Response, rel: &str) -> Vec<String> {
    let link = HeaderName::from_static("link");

    res.headers()
        .get_all(link)
        .iter()
        .filter_map(|val| val.to_str().ok())
        .flat_map(|val| val.split(','))
        .filter_map(|link| parse_link(link, rel))
        .collect()
}

fn parse_link(link: &str, rel: &str) -> Option<String> {
    let mut parts = link.split(';').map(str::trim);

    let target = parts.next()?.strip_prefix('<')?.strip_suffix('>')?;

    parts
        .filter_map(|param| param.split_once('='))
        .any(|(key, val)| key.trim() == "rel" && val.trim().trim_matches('"') == rel)
        .then(|| target.to_owned())
}

/// Reads the whole body, failing once it grows past `limit` bytes.
pub(crate) async fn req_read_body_limited(
    mut res: reqwest::Response,
    limit: usize,
) -> eyre::Result<Vec<u8>> {
    if res.content_length().is_some_and(|len| len > limit as u64) {
        return Err(Error::BodyTooLarge { limit }.into());
    }

    let mut body = Vec::new();

    while let Some(chunk) = res.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(Error::BodyTooLarge { limit }.into());
        }

        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // letsencrypt sometimes closes the TLS abruptly causing io error
    // even though we did capture the body.
    res.text().await.unwrap_or_default()
}
