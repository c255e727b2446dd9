//! Jira REST API v3 client: issue creation and attachment upload.

use crate::tracker::{IssueHandle, IssueRequest, Tracker, TrackerError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Jira Cloud REST API.
pub struct JiraClient {
    base_url: String,
    /// Full Authorization header value (e.g. "Basic <base64 email:api-token>").
    credential: String,
    issue_type: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: &str, credential: &str, issue_type: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.to_string(),
            issue_type: issue_type.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Issue-create request body: fields with project key, summary, issue
    /// type, and the description as an Atlassian Document Format paragraph.
    fn issue_payload(&self, request: &IssueRequest) -> serde_json::Value {
        json!({
            "fields": {
                "project": { "key": request.project_key },
                "summary": request.title,
                "issuetype": { "name": self.issue_type },
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [
                        {
                            "type": "paragraph",
                            "content": [
                                { "type": "text", "text": request.description }
                            ]
                        }
                    ]
                }
            }
        })
    }
}

#[async_trait]
impl Tracker for JiraClient {
    /// POST /rest/api/3/issue — create the issue and return its key/id.
    async fn create_issue(&self, request: &IssueRequest) -> Result<IssueHandle, TrackerError> {
        let url = format!("{}/rest/api/3/issue", self.base_url);
        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.credential)
            .json(&self.issue_payload(request))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(TrackerError::Api { status, body });
        }
        Ok(res.json::<IssueHandle>().await?)
    }

    /// POST /rest/api/3/issue/{key}/attachments — multipart upload of one file.
    async fn attach_file(
        &self,
        issue: &IssueHandle,
        path: &Path,
        file_name: &str,
    ) -> Result<(), TrackerError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TrackerError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/rest/api/3/issue/{}/attachments", self.base_url, issue.key);
        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.credential)
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(TrackerError::Api { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_payload_carries_project_summary_type_and_adf_description() {
        let client = JiraClient::new("https://example.atlassian.net/", "Basic abc", "Task");
        let payload = client.issue_payload(&IssueRequest {
            project_key: "KAN".to_string(),
            title: "Button crashes on submit".to_string(),
            description: "Button crashes on submit\n#bug details here".to_string(),
        });

        let fields = &payload["fields"];
        assert_eq!(fields["project"]["key"], "KAN");
        assert_eq!(fields["summary"], "Button crashes on submit");
        assert_eq!(fields["issuetype"]["name"], "Task");
        assert_eq!(fields["description"]["type"], "doc");
        assert_eq!(
            fields["description"]["content"][0]["content"][0]["text"],
            "Button crashes on submit\n#bug details here"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = JiraClient::new("https://example.atlassian.net///", "Basic abc", "Task");
        assert_eq!(client.base_url, "https://example.atlassian.net");
    }

    #[test]
    fn api_error_formats_status_and_body() {
        let err = TrackerError::Api {
            status: 401,
            body: "{\"errorMessages\":[\"Unauthorized\"]}".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("Unauthorized"));
    }
}
