use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

#[derive(Parser)]
#[command(name = "quill-smoke")]
#[command(about = "Walks the Quill auth flow against a running server")]
struct Cli {
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Health,
    /// Sign up, inspect, sign out, sign in and rotate the password (default)
    Flow {
        #[arg(long, default_value = "Str0ngP@ss")]
        password: String,
    },
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    session_id: String,
    device_label: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct SessionView {
    id: String,
    device_label: String,
    state: String,
    current: bool,
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    sessions: Vec<SessionView>,
}

/// Carries the session both as a cookie and as a bearer token, so the flow
/// also works against a server whose cookie is `Secure` over plain http.
struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(BROWSER_AGENT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn session(&mut self, response: Response, expected: StatusCode) -> Result<SessionResponse> {
        let session: SessionResponse = expect_status(response, expected).await?.json().await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    async fn health(&self) -> Result<()> {
        let response = self.request(Method::GET, "/health").send().await?;
        expect_status(response, StatusCode::OK).await?;
        Ok(())
    }

    async fn sign_up(&mut self, email: &str, password: &str) -> Result<SessionResponse> {
        let response = self
            .request(Method::POST, "/api/users/sign-up")
            .json(&json!({ "email": email, "name": "Smoke Test", "password": password }))
            .send()
            .await
            .context("sign-up request failed")?;
        self.session(response, StatusCode::CREATED).await
    }

    async fn sign_in(&mut self, email: &str, password: &str) -> Result<SessionResponse> {
        let response = self
            .request(Method::POST, "/api/users/sign-in")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("sign-in request failed")?;
        self.session(response, StatusCode::OK).await
    }

    async fn me(&self) -> Result<Response> {
        self.request(Method::GET, "/api/users/me")
            .send()
            .await
            .context("me request failed")
    }

    async fn sessions(&self) -> Result<SessionsResponse> {
        let response = self
            .request(Method::GET, "/api/users/sessions")
            .send()
            .await
            .context("sessions request failed")?;
        Ok(expect_status(response, StatusCode::OK).await?.json().await?)
    }

    /// Signs out but keeps the old token, so a later request proves it was revoked.
    async fn sign_out(&self) -> Result<()> {
        let response = self
            .request(Method::POST, "/api/users/sign-out")
            .send()
            .await
            .context("sign-out request failed")?;
        expect_status(response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    async fn change_password(&mut self, current: &str, new: &str) -> Result<SessionResponse> {
        let response = self
            .request(Method::POST, "/api/users/password")
            .json(&json!({ "current_password": current, "new_password": new }))
            .send()
            .await
            .context("password request failed")?;
        self.session(response, StatusCode::OK).await
    }
}

async fn expect_status(response: Response, expected: StatusCode) -> Result<Response> {
    let status = response.status();
    if status != expected {
        let body = response.text().await.unwrap_or_default();
        bail!("expected {expected}, got {status}: {body}");
    }
    Ok(response)
}

async fn run_flow(api: &mut ApiClient, password: &str) -> Result<()> {
    let email = format!("smoke-{}@example.com", chrono::Utc::now().timestamp_millis());

    let signed_up = api.sign_up(&email, password).await?;
    println!(
        "signed up {} ({}) on {}",
        signed_up.user.email, signed_up.user.id, signed_up.device_label
    );

    let me = expect_status(api.me().await?, StatusCode::OK).await?;
    let me: User = me.json().await?;
    println!("session resolves to {}", me.email);

    api.sign_out().await?;
    let status = api.me().await?.status();
    if status != StatusCode::UNAUTHORIZED {
        bail!("expected 401 after sign-out, got {status}");
    }
    println!("signed out");

    let signed_in = api.sign_in(&email, password).await?;
    if signed_in.session_id == signed_up.session_id {
        bail!("sign-in reused the revoked session id");
    }

    let sessions = api.sessions().await?;
    for session in &sessions.sessions {
        println!(
            "  {} {:<24} {:<8}{}",
            session.id,
            session.device_label,
            session.state,
            if session.current { " (current)" } else { "" }
        );
    }

    let new_password = format!("{password}-2");
    api.change_password(password, &new_password).await?;
    expect_status(api.me().await?, StatusCode::OK).await?;
    api.sign_in(&email, &new_password).await?;
    println!("password rotated; current session kept");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut api = ApiClient::new(cli.api_url)?;

    match cli.command.unwrap_or(Commands::Flow {
        password: "Str0ngP@ss".to_string(),
    }) {
        Commands::Health => api.health().await?,
        Commands::Flow { password } => run_flow(&mut api, &password).await?,
    }

    println!("smoke run completed");
    Ok(())
}
