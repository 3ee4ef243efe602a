use crate::error::AppError;
use crate::models::{Project, UsageRecord, UsageWindow};
use crate::providers::UsageSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

const AUTH_HEADER: &str = "X-Auth-Token";
const PROJECTS_PAGE_SIZE: &str = "1000";
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct UsagesResponse {
    #[serde(default)]
    usages: Vec<UsageRecord>,
}

/// Equinix Metal billing API client.
pub struct EquinixAdapter {
    client: Client,
    base_url: String,
    token: String,
}

impl EquinixAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn format_query_time(at: DateTime<Utc>) -> String {
        at.format(QUERY_TIME_FORMAT).to_string()
    }

    /// `created[before]` is inclusive upstream, so the exclusive window end
    /// is moved back by one millisecond.
    fn window_query(window: &UsageWindow) -> Vec<(&'static str, String)> {
        vec![
            ("created[after]", Self::format_query_time(window.start)),
            (
                "created[before]",
                Self::format_query_time(window.end - Duration::milliseconds(1)),
            ),
        ]
    }

    async fn get_json<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        debug!(url = %url, "requesting billing API");

        let response = self
            .client
            .get(url)
            .query(query)
            .header(AUTH_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("error while making the HTTP request{context}: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::Upstream(format!("error while reading the response body{context}: {e}"))
        })?;

        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "HTTP error{context}.\nStatus code: {}\nResponse body: {body}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            AppError::Upstream(format!("error while unmarshaling JSON response{context}: {e}"))
        })
    }
}

#[async_trait]
impl UsageSource for EquinixAdapter {
    fn name(&self) -> &'static str {
        "equinix"
    }

    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let url = format!("{}/projects", self.base_url);
        let query = [
            ("page", "1".to_string()),
            ("per_page", PROJECTS_PAGE_SIZE.to_string()),
            ("include", "id,name".to_string()),
        ];
        let response: ProjectsResponse = self.get_json(&url, &query, "").await?;
        Ok(response.projects)
    }

    #[instrument(skip(self, project), fields(project = %project.id))]
    async fn project_usages(
        &self,
        project: &Project,
        window: &UsageWindow,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let url = format!("{}/projects/{}/usages", self.base_url, project.id);
        let context = format!(" for project {}", project.id);
        let response: UsagesResponse = self
            .get_json(&url, &Self::window_query(window), &context)
            .await?;
        Ok(response.usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> EquinixAdapter {
        EquinixAdapter::new(Client::new(), server.uri(), "test-token")
    }

    fn project() -> Project {
        Project {
            id: "0b6c1a2e".into(),
            name: "gateway".into(),
        }
    }

    fn window(first: u32, last: u32) -> UsageWindow {
        UsageWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, first).expect("date"),
            NaiveDate::from_ymd_opt(2024, 1, last).expect("date"),
        )
        .expect("window")
    }

    #[test]
    fn window_query_ends_one_millisecond_before_exclusive_end() {
        let query = EquinixAdapter::window_query(&window(1, 3));
        assert_eq!(query[0], ("created[after]", "2024-01-01T00:00:00.000".to_string()));
        assert_eq!(query[1], ("created[before]", "2024-01-03T23:59:59.999".to_string()));
    }

    #[test]
    fn window_query_does_not_reach_into_the_day_after_the_end_date() {
        let query = EquinixAdapter::window_query(&window(3, 3));
        assert_eq!(query[0].1, "2024-01-03T00:00:00.000");
        assert_eq!(query[1].1, "2024-01-03T23:59:59.999");
        assert_ne!(query[1].1, "2024-01-04T23:59:59.999");
    }

    #[test]
    fn window_query_keeps_sub_day_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 6, 30, 0).unwrap();
        let window = UsageWindow::new(start, start + Duration::hours(1)).expect("window");
        let query = EquinixAdapter::window_query(&window);
        assert_eq!(query[0].1, "2024-01-03T06:30:00.000");
        assert_eq!(query[1].1, "2024-01-03T07:29:59.999");
    }

    #[tokio::test]
    async fn list_projects_sends_token_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "1000"))
            .and(query_param("include", "id,name"))
            .and(header("X-Auth-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    { "id": "p1", "name": "alpha", "created_at": "2021-01-01" },
                    { "id": "p2", "name": "Beta" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let projects = adapter(&server)
            .list_projects()
            .await
            .expect("projects should load");
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].name, "Beta");
    }

    #[tokio::test]
    async fn list_projects_reports_status_and_body_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"errors\":[\"bad token\"]}"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .list_projects()
            .await
            .expect_err("401 should fail");
        let msg = err.to_string();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(msg.contains("Status code: 401"));
        assert!(msg.contains("bad token"));
    }

    #[tokio::test]
    async fn project_usages_queries_the_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/0b6c1a2e/usages"))
            .and(query_param("created[after]", "2024-01-05T00:00:00.000"))
            .and(query_param("created[before]", "2024-01-05T23:59:59.999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "usages": [{
                    "metro": "da",
                    "plan": "c3.small.x86",
                    "type": "Instance",
                    "name": "gateway-lb-1",
                    "price": 1.5,
                    "quantity": 24,
                    "total": 36.0,
                    "unit": "hour"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let usages = adapter(&server)
            .project_usages(&project(), &window(5, 5))
            .await
            .expect("usages should load");
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].usage_type, "Instance");
        assert_eq!(usages[0].quantity, 24.0);
        assert_eq!(usages[0].total, 36.0);
    }

    #[tokio::test]
    async fn project_usages_names_the_project_on_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/0b6c1a2e/usages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .project_usages(&project(), &window(5, 5))
            .await
            .expect_err("html body should fail");
        let msg = err.to_string();
        assert!(msg.contains("unmarshaling JSON"));
        assert!(msg.contains("for project 0b6c1a2e"));
    }
}
