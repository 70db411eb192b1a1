use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::scanner::Preview;

/// Identity and target used by the upload stage.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub app_identifier: String,
    pub platform: String,
}

impl Credentials {
    pub fn resolve(
        username: Option<String>,
        app_identifier: Option<String>,
        platform: String,
    ) -> Result<Self> {
        Ok(Credentials {
            username: username
                .context("Missing account username. Pass --username or set PREVIEWS_STORE_USERNAME")?,
            app_identifier: app_identifier.context(
                "Missing app identifier. Pass --app-identifier or set PREVIEWS_STORE_APP_IDENTIFIER",
            )?,
            platform,
        })
    }
}

/// Application resolved on the store side.
#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub id: String,
}

/// Open editable version container for one platform.
#[derive(Debug, Clone, Deserialize)]
pub struct EditVersion {
    pub id: String,
}

/// One trailer attachment for an open edit version.
#[derive(Debug)]
pub struct TrailerUpload<'a> {
    pub video_path: &'a Path,
    pub poster_path: &'a Path,
    pub locale: &'a str,
    pub device_type: &'a str,
    pub timestamp: &'a str,
    pub order: u32,
}

impl<'a> TrailerUpload<'a> {
    pub fn from_preview(preview: &'a Preview) -> Self {
        TrailerUpload {
            video_path: &preview.video_path,
            poster_path: &preview.poster_path,
            locale: &preview.locale,
            device_type: &preview.device_type,
            timestamp: &preview.timestamp,
            order: preview.order,
        }
    }
}

/// The store operations the upload stage depends on. The HTTP client
/// implements this for real; tests substitute a recording fake.
pub trait StoreClient {
    /// Authenticate and select the team context.
    fn login(&mut self, username: &str) -> Result<()>;
    fn find_app(&mut self, app_identifier: &str) -> Result<App>;
    fn create_edit_version(&mut self, app: &App, platform: &str) -> Result<EditVersion>;
    fn upload_trailer(&mut self, version: &EditVersion, trailer: &TrailerUpload) -> Result<()>;
    fn save_version(&mut self, version: &EditVersion) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: String,
}

/// Blocking HTTP client for the store management API.
pub struct HttpStoreClient {
    client: Client,
    base_url: String,
    api_key: String,
    team_id: Option<String>,
    session_token: Option<String>,
}

impl HttpStoreClient {
    pub fn new(base_url: String, api_key: String, team_id: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(HttpStoreClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            team_id,
            session_token: None,
        })
    }

    /// Create client from environment: PREVIEWS_STORE_URL,
    /// PREVIEWS_STORE_API_KEY, and optionally PREVIEWS_STORE_TEAM_ID.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("PREVIEWS_STORE_URL").context("Missing store URL. Set PREVIEWS_STORE_URL")?;
        let api_key = std::env::var("PREVIEWS_STORE_API_KEY")
            .context("Missing API key. Set PREVIEWS_STORE_API_KEY")?;
        let team_id = std::env::var("PREVIEWS_STORE_TEAM_ID").ok();

        Self::new(base_url, api_key, team_id)
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("X-API-Key", self.api_key.as_str());
        match &self.session_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Store request failed with status {}: {}", status, error_text);
        }
        Ok(response)
    }

    /// POST JSON body and deserialize the JSON response.
    fn post_json<T: DeserializeOwned, B: serde::Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self
            .apply_auth(request)
            .send()
            .context("Failed to send request")?;
        Self::check_status(response)?
            .json()
            .context("Failed to parse response as JSON")
    }

    /// POST JSON body, ignoring the response body.
    fn post_unit<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self
            .apply_auth(request)
            .send()
            .context("Failed to send request")?;
        Self::check_status(response)?;
        Ok(())
    }

    /// GET with query parameters, deserializing the JSON response.
    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self
            .apply_auth(request)
            .send()
            .context("Failed to send request")?;
        Self::check_status(response)?
            .json()
            .context("Failed to parse response as JSON")
    }
}

impl StoreClient for HttpStoreClient {
    fn login(&mut self, username: &str) -> Result<()> {
        let session: SessionResponse = self.post_json(
            "/v1/sessions",
            &serde_json::json!({ "username": username }),
        )?;
        self.session_token = Some(session.token);

        let team = match &self.team_id {
            Some(id) => session
                .teams
                .iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| anyhow!("Team {} not available for {}", id, username))?,
            None => session
                .teams
                .first()
                .ok_or_else(|| anyhow!("No teams available for {}", username))?,
        };
        self.post_unit(
            "/v1/sessions/team",
            &serde_json::json!({ "team_id": team.id }),
        )
    }

    fn find_app(&mut self, app_identifier: &str) -> Result<App> {
        let apps: Vec<App> = self.get_json(
            "/v1/apps",
            &[("bundle_id", app_identifier.to_string())],
        )?;
        apps.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Application not found: {}", app_identifier))
    }

    fn create_edit_version(&mut self, app: &App, platform: &str) -> Result<EditVersion> {
        self.post_json(
            &format!("/v1/apps/{}/versions", app.id),
            &serde_json::json!({ "platform": platform }),
        )
    }

    fn upload_trailer(&mut self, version: &EditVersion, trailer: &TrailerUpload) -> Result<()> {
        let form = multipart::Form::new()
            .text("locale", trailer.locale.to_string())
            .text("device_type", trailer.device_type.to_string())
            .text("timestamp", trailer.timestamp.to_string())
            .text("order", trailer.order.to_string())
            .file("video", trailer.video_path)
            .with_context(|| format!("Failed to open video: {}", trailer.video_path.display()))?
            .file("poster", trailer.poster_path)
            .with_context(|| format!("Failed to open poster: {}", trailer.poster_path.display()))?;

        let request = self
            .client
            .post(self.build_url(&format!("/v1/versions/{}/trailers", version.id)))
            .multipart(form);
        let response = self
            .apply_auth(request)
            .send()
            .context("Failed to send request")?;
        Self::check_status(response)?;
        Ok(())
    }

    fn save_version(&mut self, version: &EditVersion) -> Result<()> {
        self.post_unit(
            &format!("/v1/versions/{}/save", version.id),
            &serde_json::json!({}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpStoreClient::new(
            "https://store.example.com/".to_string(),
            "key".to_string(),
            None,
        )
        .unwrap();
        assert_eq!(
            client.build_url("/v1/apps"),
            "https://store.example.com/v1/apps"
        );
    }

    #[test]
    fn test_credentials_require_username_and_app() {
        let err = Credentials::resolve(None, Some("com.example.app".into()), "ios".into())
            .unwrap_err();
        assert!(err.to_string().contains("username"));

        let err = Credentials::resolve(Some("dev@example.com".into()), None, "ios".into())
            .unwrap_err();
        assert!(err.to_string().contains("app identifier"));

        let creds = Credentials::resolve(
            Some("dev@example.com".into()),
            Some("com.example.app".into()),
            "ios".into(),
        )
        .unwrap();
        assert_eq!(creds.platform, "ios");
    }
}
