//! Blocking HTTP implementation of the backend contract.
//!
//! GET endpoints require exactly `200 OK`; the form POSTs accept any 2xx.
//! Forms go out `application/x-www-form-urlencoded`.

use crate::grid::{parse_array, ArrayEntry};
use crate::rendering::Blob;
use crate::{sniff_mime, Backend, ClientConfig, Error, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

pub struct HttpBackend {
    client: Client,
    base: Url,
    api_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", api_url))
            .map_err(|e| Error::ConfigError(format!("api_url '{}': {}", config.api_url, e)))?;

        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::ConfigError(format!("user agent: {}", e)))?;
        headers.insert(USER_AGENT, ua);
        for (k, v) in &config.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::ConfigError(format!("header name '{}': {}", k, e)))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| Error::ConfigError(format!("header '{}' value: {}", k, e)))?;
            headers.insert(name, value);
        }

        let timeout = if config.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(config.timeout_ms))
        };

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base, api_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::ConfigError(format!("cannot resolve endpoint {}: {}", path, e)))
    }

    fn send_get(&self, url: Url, endpoint: &str) -> Result<Response> {
        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::NetworkError(format!("GET {} failed: {}", endpoint, e)))?;
        if resp.status() != StatusCode::OK {
            return Err(Error::HttpStatus { endpoint: endpoint.to_string(), status: resp.status().as_u16() });
        }
        Ok(resp)
    }

    fn send_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Response> {
        let url = self.endpoint(endpoint.trim_start_matches('/'))?;
        log::debug!("POST {} ({} fields)", url, form.len());
        let resp = self
            .client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| Error::NetworkError(format!("POST {} failed: {}", endpoint, e)))?;
        if !resp.status().is_success() {
            return Err(Error::HttpStatus { endpoint: endpoint.to_string(), status: resp.status().as_u16() });
        }
        Ok(resp)
    }
}

fn read_body(resp: Response, endpoint: &str) -> Result<String> {
    resp.text()
        .map_err(|e| Error::NetworkError(format!("Failed to read {} response body: {}", endpoint, e)))
}

fn json_body(resp: Response, endpoint: &str) -> Result<serde_json::Value> {
    let body = read_body(resp, endpoint)?;
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| Error::MalformedResponse(format!("{} body is not JSON: {}", endpoint, e)))
}

impl Backend for HttpBackend {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn get_images(&self) -> Result<Vec<String>> {
        let resp = self.send_get(self.endpoint("getImages")?, "/getImages")?;
        let value = json_body(resp, "/getImages")?;
        match value.get("image_files").and_then(|v| v.as_array()) {
            Some(files) => files
                .iter()
                .map(|f| {
                    f.as_str()
                        .map(|s| s.to_string())
                        .ok_or_else(|| Error::MalformedResponse(format!("image_files entry {} is not a string", f)))
                })
                .collect(),
            None => {
                let message = value.get("message").and_then(|m| m.as_str()).unwrap_or("no image_files");
                Err(Error::MalformedResponse(format!("No images found: {}", message)))
            }
        }
    }

    fn get_array(&self, component_name: &str) -> Result<Vec<ArrayEntry>> {
        let mut url = self.endpoint("getArray")?;
        url.query_pairs_mut().append_pair("component_name", component_name);
        let resp = self.send_get(url, "/getArray")?;
        let value = json_body(resp, "/getArray")?;
        parse_array(&value)
    }

    fn post_positions(&self, component_name: &str, positions_json: &str, user_prompt: Option<&str>) -> Result<()> {
        let mut form = vec![("positions", positions_json), ("componentName", component_name)];
        if let Some(prompt) = user_prompt {
            form.push(("user_prompt", prompt));
        }
        self.send_form("/positions", &form)?;
        Ok(())
    }

    fn clear_collage(&self, component_name: &str) -> Result<()> {
        self.send_form("/clearCollage", &[("component_name", component_name)])?;
        Ok(())
    }

    fn update_image_selection_mode(&self, new_mode: &str) -> Result<serde_json::Value> {
        let resp = self.send_form("/update_image_selection_mode", &[("new_mode", new_mode)])?;
        json_body(resp, "/update_image_selection_mode")
    }

    fn new_selection(&self, component_name: &str, target_id: u32) -> Result<serde_json::Value> {
        let target = target_id.to_string();
        let resp = self.send_form("/new_selection", &[("component_name", component_name), ("target_id", &target)])?;
        json_body(resp, "/new_selection")
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.download(url).map(|(_, bytes)| bytes)
    }

    fn fetch_blob(&self, url: &str) -> Result<Blob> {
        let (content_type, bytes) = self.download(url)?;
        let mime = content_type.unwrap_or_else(|| sniff_mime(&bytes));
        Ok(Blob { mime, bytes })
    }
}

impl HttpBackend {
    /// GET `url`; returns the bare media type from `Content-Type` and the body.
    fn download(&self, url: &str) -> Result<(Option<String>, Vec<u8>)> {
        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;
        if !resp.status().is_success() {
            return Err(Error::HttpStatus { endpoint: url.to_string(), status: resp.status().as_u16() });
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let bytes = resp
            .bytes()
            .map_err(|e| Error::NetworkError(format!("Failed to read body of {}: {}", url, e)))?;
        Ok((content_type, bytes.to_vec()))
    }
}
