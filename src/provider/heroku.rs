//! Heroku provider, git-transport strategy.
//!
//! Authenticates against the Platform API, installs the ephemeral public
//! key on the account, then force-pushes HEAD to the app's git remote
//! through the `GIT_SSH` wrapper. `restart` and post-deploy `run`
//! directives go back through the API as dyno operations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::error::ProviderError;
use super::{Provider, ProviderFactory};
use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::error::Result;
use crate::shell::{RunOptions, ShellRunner};

const DEFAULT_API_BASE: &str = "https://api.heroku.com";
const ACCEPT_HEADER: &str = "application/vnd.heroku+json; version=3";

pub struct HerokuProvider {
    config: Arc<DeployConfig>,
    shell: ShellRunner,
    client: Client,
    base_url: String,
    /// git remote reported by the API, memoized by check_app
    git_url: Option<String>,
    /// id of the installed ephemeral key, set by setup_key
    key_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    email: String,
}

#[derive(Debug, Deserialize)]
struct App {
    name: String,
    git_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SshKey {
    id: String,
}

impl HerokuProvider {
    pub fn new(config: Arc<DeployConfig>) -> Result<Self> {
        let base_url = config
            .str_option("endpoint")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            config,
            shell: ShellRunner::default(),
            client,
            base_url,
            git_url: None,
            key_id: None,
        })
    }

    fn api_key(&self) -> Result<String> {
        self.config.str_option_any("api_key", &["password"])
    }

    fn app(&self) -> Result<String> {
        self.config.str_option("app")
    }

    fn request(&self, ctx: &DeployContext, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, ctx.user_agent())
            .bearer_auth(self.api_key()?))
    }

    /// SSH remote for the push; the API-reported URL when known.
    fn git_remote(&self) -> Result<String> {
        match &self.git_url {
            Some(url) => Ok(url.clone()),
            None => Ok(format!("git@heroku.com:{}.git", self.app()?)),
        }
    }
}

async fn api_error(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ProviderError::api(status, message.trim().to_string())
}

#[async_trait]
impl Provider for HerokuProvider {
    fn name(&self) -> &'static str {
        "heroku"
    }

    async fn check_auth(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let response = self
            .request(ctx, Method::GET, "/account")?
            .send()
            .await
            .map_err(ProviderError::Network)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::auth("heroku", "invalid API key").into())
            }
            status if status.is_success() => {
                let account: Account = response.json().await.map_err(ProviderError::Network)?;
                println!(
                    "{}",
                    style(format!("Authenticated as {}", account.email)).dim()
                );
                Ok(())
            }
            _ => Err(api_error(response).await.into()),
        }
    }

    async fn check_app(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let app = self.app()?;
        let response = self
            .request(ctx, Method::GET, &format!("/apps/{app}"))?
            .send()
            .await
            .map_err(ProviderError::Network)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                Err(ProviderError::invalid_app(app, "no such app on this account").into())
            }
            status if status.is_success() => {
                let details: App = response.json().await.map_err(ProviderError::Network)?;
                tracing::debug!(app = %details.name, "found target application");
                self.git_url = details.git_url;
                Ok(())
            }
            _ => Err(api_error(response).await.into()),
        }
    }

    async fn setup_key(&mut self, ctx: &mut DeployContext, public_key_path: &Path) -> Result<()> {
        let public_key = std::fs::read_to_string(public_key_path)?.trim().to_string();
        let response = self
            .request(ctx, Method::POST, "/account/keys")?
            .json(&serde_json::json!({ "public_key": public_key }))
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        let key: SshKey = response.json().await.map_err(ProviderError::Network)?;
        self.key_id = Some(key.id);
        Ok(())
    }

    async fn remove_key(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let Some(id) = self.key_id.take() else {
            return Ok(());
        };
        let response = self
            .request(ctx, Method::DELETE, &format!("/account/keys/{id}"))?
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        Ok(())
    }

    async fn push_app(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let remote = self.git_remote()?;
        self.shell
            .run(
                ctx,
                &format!("git push {remote} HEAD:refs/heads/main -f"),
                &RunOptions::retrying(),
            )
            .await
    }

    async fn restart(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let app = self.app()?;
        let response = self
            .request(ctx, Method::DELETE, &format!("/apps/{app}/dynos"))?
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        Ok(())
    }

    async fn run(&mut self, ctx: &mut DeployContext, command: &str) -> Result<()> {
        let app = self.app()?;
        let response = self
            .request(ctx, Method::POST, &format!("/apps/{app}/dynos"))?
            .json(&serde_json::json!({ "command": command, "attach": false }))
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        println!("{}", style(format!("Started one-off dyno: {command}")).dim());
        Ok(())
    }
}

pub struct HerokuFactory;

impl ProviderFactory for HerokuFactory {
    fn name(&self) -> &'static str {
        "heroku"
    }

    fn create(&self, config: Arc<DeployConfig>) -> Result<Box<dyn Provider>> {
        Ok(Box::new(HerokuProvider::new(config)?))
    }
}
