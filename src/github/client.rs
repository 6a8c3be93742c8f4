//! GitHub REST client: token/repository preflight and issue creation.

use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::notifier::NewIssue;
use crate::config::{GitHubTarget, HttpConfig};
use crate::error::{render_error_body, truncate, TicketError};

/// Outcome of the preflight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    /// Token works, repository is reachable and accepts issues.
    Ready { login: String },
    /// Ticketing is disabled for this run.
    DryRun { reason: String },
}

impl Preflight {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    fn dry_run(reason: impl Into<String>) -> Self {
        Self::DryRun {
            reason: reason.into(),
        }
    }
}

/// GitHub API client bound to one repository.
pub struct GitHubClient {
    http_client: Client,
    api_url: String,
    target: GitHubTarget,
    user_agent: String,
    timeout: Duration,
    preflight_timeout: Duration,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(
        api_url: &str,
        target: GitHubTarget,
        user_agent: &str,
        http: &HttpConfig,
    ) -> Result<Self, TicketError> {
        let http_client = Client::builder()
            .connect_timeout(http.connect_timeout())
            .build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            target,
            user_agent: format!("{}/{}", user_agent, env!("CARGO_PKG_VERSION")),
            timeout: http.timeout(),
            preflight_timeout: http.preflight_timeout(),
        })
    }

    pub fn target(&self) -> &GitHubTarget {
        &self.target
    }

    fn request(&self, method: Method, path: &str, timeout: Duration) -> RequestBuilder {
        let mut request = self
            .http_client
            .request(method, format!("{}{}", self.api_url, path))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent)
            .timeout(timeout);

        if let Some(token) = &self.target.token {
            request = request.header("Authorization", format!("token {}", token.as_str()));
        }

        request
    }

    fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.target.owner, self.target.repo)
    }

    /// Verify the token, repository access and that issues are enabled.
    ///
    /// Every failure is logged with remediation text and yields a dry run.
    pub async fn preflight(&self) -> Preflight {
        if self.target.token.is_none() {
            info!("GitHub token not set, issues run in DRY RUN mode");
            return Preflight::dry_run("GitHub token not set");
        }

        let response = match self
            .request(Method::GET, "/user", self.preflight_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("[GITHUB AUTH] Could not reach GitHub: {}", e);
                return Preflight::dry_run(format!("GitHub unreachable: {}", e));
            }
        };

        let status = response.status();
        if status.as_u16() == 401 {
            warn!("[GITHUB AUTH] 401 Bad credentials. Fixes:");
            warn!("  - Paste the *token value* (not an ID) into GITHUB_TOKEN");
            warn!("  - Ensure the token isn't expired and (if required) SSO-authorized");
            warn!("  - Fine-grained: grant Issues: Read & Write and select this repo");
            return Preflight::dry_run("bad credentials");
        }
        if !status.is_success() {
            warn!("[GITHUB AUTH] Token check failed (HTTP {})", status.as_u16());
            return Preflight::dry_run(format!("token check failed: HTTP {}", status.as_u16()));
        }

        let login = response
            .json::<GitHubUser>()
            .await
            .map(|u| u.login)
            .unwrap_or_default();
        info!("[GITHUB AUTH] Token OK as: {}", login);

        let response = match self
            .request(Method::GET, &self.repo_path(), self.preflight_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("[GITHUB AUTH] Could not reach repo {}: {}", self.target.slug(), e);
                return Preflight::dry_run(format!("repository unreachable: {}", e));
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            warn!(
                "[GITHUB AUTH] Cannot access repo {} ({}).",
                self.target.slug(),
                status.as_u16()
            );
            warn!("  - Check GITHUB_REPO_OWNER/GITHUB_REPO_NAME and repo visibility");
            warn!("  - Fine-grained: ensure this repo is selected; Classic: use repo/public_repo scope");
            return Preflight::dry_run(format!("repository not accessible: HTTP {}", status.as_u16()));
        }

        let repo = response.json::<GitHubRepo>().await.unwrap_or_default();
        if repo.has_issues == Some(false) {
            warn!("[GITHUB AUTH] Repo has Issues disabled. Enable Issues in repo Settings > Features.");
            return Preflight::dry_run("issues disabled on repository");
        }

        info!("[GITHUB AUTH] Repo reachable: {}", self.target.slug());
        Preflight::Ready { login }
    }

    /// Create one issue. Returns its `html_url`.
    pub async fn create_issue(&self, issue: &NewIssue) -> Result<String, TicketError> {
        let path = format!("{}/issues", self.repo_path());

        let response = self
            .request(Method::POST, &path, self.timeout)
            .json(issue)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            error!("[GitHub ERROR] {} {}", status.as_u16(), render_error_body(&body));
            return Err(TicketError::Api {
                status: status.as_u16(),
                message: truncate(&body, 800),
            });
        }

        let created: CreatedIssue = response.json().await?;
        info!("Created issue: {}", created.html_url);
        Ok(created.html_url)
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubRepo {
    #[serde(default)]
    has_issues: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    #[serde(default)]
    html_url: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pim::client::tests::test_http_config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zeroize::Zeroizing;

    pub(crate) fn test_github(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let target = GitHubTarget {
            owner: "acme".into(),
            repo: "pim-findings".into(),
            token: token.map(|t| Zeroizing::new(t.to_string())),
        };
        GitHubClient::new(&server.uri(), target, "pim-anti-sticky-bot", &test_http_config())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_without_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_github(&server, None);
        assert!(!client.preflight().await.is_ready());
    }

    #[tokio::test]
    async fn test_preflight_ready() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "token ghp_test"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "audit-bot"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/pim-findings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/pim-findings",
                "has_issues": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_github(&server, Some("ghp_test"));
        assert_eq!(
            client.preflight().await,
            Preflight::Ready {
                login: "audit-bot".into()
            }
        );
    }

    #[tokio::test]
    async fn test_preflight_bad_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "Bad credentials"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/pim-findings"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_github(&server, Some("expired"));
        assert_eq!(
            client.preflight().await,
            Preflight::DryRun {
                reason: "bad credentials".into()
            }
        );
    }

    #[tokio::test]
    async fn test_preflight_repo_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "audit-bot"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/pim-findings"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let client = test_github(&server, Some("ghp_test"));
        assert!(!client.preflight().await.is_ready());
    }

    #[tokio::test]
    async fn test_preflight_issues_disabled() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "audit-bot"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/pim-findings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"has_issues": false})))
            .mount(&server)
            .await;

        let client = test_github(&server, Some("ghp_test"));
        assert_eq!(
            client.preflight().await,
            Preflight::DryRun {
                reason: "issues disabled on repository".into()
            }
        );
    }

    #[tokio::test]
    async fn test_create_issue() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/pim-findings/issues"))
            .and(body_partial_json(json!({
                "title": "Permanent privileged assignment: alice@contoso.com → Global Administrator",
                "labels": ["pim", "sticky-admin"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 7,
                "html_url": "https://github.com/acme/pim-findings/issues/7"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_github(&server, Some("ghp_test"));
        let issue = NewIssue {
            title: "Permanent privileged assignment: alice@contoso.com → Global Administrator"
                .into(),
            body: "Detected".into(),
            labels: vec!["pim".into(), "sticky-admin".into()],
        };

        let url = client.create_issue(&issue).await.unwrap();
        assert_eq!(url, "https://github.com/acme/pim-findings/issues/7");
    }

    #[tokio::test]
    async fn test_create_issue_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/pim-findings/issues"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Validation Failed"
            })))
            .mount(&server)
            .await;

        let client = test_github(&server, Some("ghp_test"));
        let issue = NewIssue {
            title: "t".into(),
            body: "b".into(),
            labels: vec![],
        };

        let err = client.create_issue(&issue).await.unwrap_err();
        assert!(matches!(err, TicketError::Api { status: 422, .. }));
    }
}
