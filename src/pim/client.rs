//! Microsoft Graph directory client for PIM role collections.
//!
//! Follows `@odata.nextLink` continuation links until exhausted and sleeps
//! through throttling responses. Any other error status aborts the fetch.

use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::models::{
    RoleAssignment, RoleAssignmentScheduleInstance, RoleDefinition, RoleEligibilitySchedule,
    UserProfile,
};
use crate::auth::AccessToken;
use crate::config::HttpConfig;
use crate::error::{render_error_body, truncate, ApiError};

pub const ROLE_ASSIGNMENTS_PATH: &str = "/roleManagement/directory/roleAssignments";
pub const ROLE_ELIGIBILITY_SCHEDULES_PATH: &str = "/roleManagement/directory/roleEligibilitySchedules";
pub const ROLE_ASSIGNMENT_SCHEDULE_INSTANCES_PATH: &str =
    "/roleManagement/directory/roleAssignmentScheduleInstances";
pub const ROLE_DEFINITIONS_PATH: &str = "/roleManagement/directory/roleDefinitions";
pub const USERS_PATH: &str = "/users";

/// Read-only Graph client bound to one access token.
pub struct DirectoryClient {
    http_client: Client,
    base_url: String,
    token: AccessToken,
    page_size: u32,
    default_retry_after: Duration,
}

impl DirectoryClient {
    /// Create a new directory client.
    pub fn new(base_url: &str, token: AccessToken, http: &HttpConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(http.timeout())
            .connect_timeout(http.connect_timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            page_size: http.page_size,
            default_retry_after: http.default_retry_after(),
        })
    }

    /// Fetch every page of a collection, in server order.
    ///
    /// `query` is sent with the first request only; continuation links carry their own.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let mut url = format!("{}{}", self.base_url, path);
        let mut first_page = true;
        let mut items = Vec::new();
        let mut pages = 0usize;

        loop {
            debug!("Fetching page: {}", url);

            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(self.token.secret())
                .header(ACCEPT, "application/json")
                .header("Prefer", format!("odata.maxpagesize={}", self.page_size));

            if first_page && !query.is_empty() {
                request = request.query(query);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(response.headers()).unwrap_or(self.default_retry_after);
                warn!(
                    "[Graph] 429 throttled on {}, sleeping {}s",
                    path,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.as_u16() >= 400 {
                let body = response.text().await.unwrap_or_default();
                error!("[Graph ERROR] {} {}", status.as_u16(), render_error_body(&body));
                return Err(graph_error(status, &body));
            }

            let page: ODataPage<T> = response
                .json()
                .await
                .map_err(|e| ApiError::ParseFailed(e.to_string()))?;

            pages += 1;
            first_page = false;
            items.extend(page.value);

            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!("Fetched {} items from {} in {} page(s)", items.len(), path, pages);
        Ok(items)
    }

    /// Fetch a single resource. One attempt, no throttling retry.
    pub async fn get_item<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.token.secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(graph_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::ParseFailed(e.to_string()))
    }

    pub async fn role_assignments(&self) -> Result<Vec<RoleAssignment>, ApiError> {
        let items = self.fetch_all(ROLE_ASSIGNMENTS_PATH, &[]).await?;
        info!("Got {} role assignments", items.len());
        Ok(items)
    }

    pub async fn role_eligibility_schedules(
        &self,
    ) -> Result<Vec<RoleEligibilitySchedule>, ApiError> {
        let items = self.fetch_all(ROLE_ELIGIBILITY_SCHEDULES_PATH, &[]).await?;
        info!("Got {} eligibility schedules", items.len());
        Ok(items)
    }

    /// All activation instances. Time filtering happens client-side: this
    /// endpoint rejects some `$filter`/`$orderby` combinations.
    pub async fn role_assignment_schedule_instances(
        &self,
    ) -> Result<Vec<RoleAssignmentScheduleInstance>, ApiError> {
        self.fetch_all(ROLE_ASSIGNMENT_SCHEDULE_INSTANCES_PATH, &[])
            .await
    }

    /// Bulk role definitions. No `$top`, which this endpoint answers with 400.
    pub async fn role_definitions(&self) -> Result<Vec<RoleDefinition>, ApiError> {
        self.fetch_all(ROLE_DEFINITIONS_PATH, &[]).await
    }

    pub async fn role_definition(&self, id: &str) -> Result<RoleDefinition, ApiError> {
        let path = format!("{}/{}", ROLE_DEFINITIONS_PATH, urlencoding::encode(id));
        self.get_item(&path).await
    }

    pub async fn user(&self, id: &str) -> Result<UserProfile, ApiError> {
        let path = format!("{}/{}", USERS_PATH, urlencoding::encode(id));
        self.get_item(&path).await
    }
}

/// One page of an OData collection.
#[derive(Debug, Deserialize)]
struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

fn graph_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ODataError>(body) {
        Ok(odata) => ApiError::Graph {
            status: status.as_u16(),
            code: odata.error.code,
            message: odata.error.message,
        },
        Err(_) => ApiError::Graph {
            status: status.as_u16(),
            code: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: truncate(body, 800),
        },
    }
}

/// Retry-After in whole seconds, when present and numeric.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
