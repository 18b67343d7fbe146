use uf_config::{parse_remote_config, ConfigError, WebsiteMap, WebsiteSource, CONFIG_URL};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

/// Fetches the selector map with `window.fetch`.
pub struct FetchSource {
    url: String,
}

impl FetchSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for FetchSource {
    fn default() -> Self {
        Self::new(CONFIG_URL)
    }
}

fn fetch_error(e: JsValue) -> ConfigError {
    ConfigError::Fetch(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

impl WebsiteSource for FetchSource {
    async fn fetch(&self) -> Result<WebsiteMap, ConfigError> {
        let window = web_sys::window().ok_or_else(|| ConfigError::Fetch("no window".to_string()))?;
        let response: Response = JsFuture::from(window.fetch_with_str(&self.url))
            .await
            .map_err(fetch_error)?
            .dyn_into()
            .map_err(fetch_error)?;
        if !response.ok() {
            return Err(ConfigError::Status(response.status()));
        }
        let body = JsFuture::from(response.text().map_err(fetch_error)?)
            .await
            .map_err(fetch_error)?
            .as_string()
            .unwrap_or_default();
        Ok(parse_remote_config(&body)?.websites)
    }
}
