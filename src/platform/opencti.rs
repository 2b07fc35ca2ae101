//! OpenCTI GraphQL client.
//!
//! Implements [`ReportSource`] and [`ReportSink`] against the `/graphql`
//! endpoint with bearer-token authentication. File uploads use the GraphQL
//! multipart request convention (`operations`, `map`, then the file part).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::error::SinkError;

use super::{ReportFilter, ReportPage, ReportRef, ReportSink, ReportSource};

const REPORT_FIELDS: &str = r"
fragment ReportFields on Report {
  id
  name
  description
  report_types
  objectLabel { id value color }
  externalReferences { edges { node { url } } }
}";

const REPORTS_QUERY: &str = r"
query Reports($first: Int, $after: ID) {
  reports(first: $first, after: $after, orderBy: created, orderMode: desc) {
    edges { node { ...ReportFields } }
    pageInfo { endCursor hasNextPage }
  }
}";

const REPORT_QUERY: &str = r"
query Report($id: String!) {
  report(id: $id) { ...ReportFields }
}";

const DESCRIPTION_MUTATION: &str = r"
mutation UpdateDescription($id: ID!, $input: [EditInput]!) {
  stixDomainObjectEdit(id: $id) { fieldPatch(input: $input) { id } }
}";

const IMPORT_MUTATION: &str = r"
mutation ImportFile($reportId: ID!, $file: Upload!) {
  stixDomainObjectEdit(id: $reportId) { importPush(file: $file) { id name } }
}";

const LABEL_ADD_MUTATION: &str = r"
mutation LabelAdd($input: LabelAddInput!) {
  labelAdd(input: $input) { id }
}";

const LABEL_RELATION_MUTATION: &str = r"
mutation AddLabel($id: ID!, $input: StixRefRelationshipAddInput!) {
  stixDomainObjectEdit(id: $id) { relationAdd(input: $input) { id } }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ExternalReferenceNode {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportNode {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    report_types: Option<Vec<String>>,
    #[serde(rename = "objectLabel", default)]
    object_label: Option<Vec<LabelNode>>,
    #[serde(rename = "externalReferences", default)]
    external_references: Option<Connection<ExternalReferenceNode>>,
}

impl From<ReportNode> for ReportRef {
    fn from(node: ReportNode) -> Self {
        Self {
            id: node.id,
            name: node.name.unwrap_or_default(),
            description: node.description.unwrap_or_default(),
            external_references: node
                .external_references
                .map(|c| c.edges.into_iter().filter_map(|e| e.node.url).collect())
                .unwrap_or_default(),
            report_types: node.report_types.unwrap_or_default(),
            labels: node
                .object_label
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.value)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportsData {
    reports: Connection<ReportNode>,
}

#[derive(Debug, Deserialize)]
struct ReportData {
    report: Option<ReportNode>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LabelAddData {
    #[serde(rename = "labelAdd")]
    label_add: Option<IdNode>,
}

/// Client for one OpenCTI instance.
#[derive(Debug, Clone)]
pub struct OpenCtiClient {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl OpenCtiClient {
    /// Client for the platform at `base_url` (the GraphQL endpoint is
    /// `{base_url}/graphql`).
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, SinkError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SinkError::Transport(format!("invalid platform URL {base_url}: {e}")))?;
        let endpoint = Url::parse(&format!("{}/graphql", base.as_str().trim_end_matches('/')))
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint, token: token.to_string() })
    }

    /// GraphQL endpoint in use.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, SinkError> {
        debug!(operation, "GraphQL request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        decode(operation, response).await
    }
}

async fn decode<T: DeserializeOwned>(operation: &'static str, response: reqwest::Response) -> Result<T, SinkError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SinkError::Rejected {
            operation,
            message: format!("HTTP {status}: {}", body.chars().take(300).collect::<String>()),
        });
    }
    let parsed: GraphQlResponse<T> = response
        .json()
        .await
        .map_err(|e| SinkError::Transport(format!("invalid response for {operation}: {e}")))?;
    into_data(operation, parsed)
}

fn into_data<T>(operation: &'static str, response: GraphQlResponse<T>) -> Result<T, SinkError> {
    if !response.errors.is_empty() {
        let message = response.errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
        return Err(SinkError::Rejected { operation, message });
    }
    response.data.ok_or_else(|| SinkError::Rejected { operation, message: "response has no data".to_string() })
}

#[async_trait]
impl ReportSource for OpenCtiClient {
    async fn list_candidate_reports(
        &self,
        filter: &ReportFilter,
        first: usize,
        after: Option<&str>,
    ) -> Result<ReportPage, SinkError> {
        let data: ReportsData = self
            .execute(
                "reports",
                &format!("{REPORTS_QUERY}\n{REPORT_FIELDS}"),
                json!({ "first": first, "after": after }),
            )
            .await?;

        let next_cursor = data
            .reports
            .page_info
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor);
        let reports = data
            .reports
            .edges
            .into_iter()
            .map(|e| ReportRef::from(e.node))
            .filter(|r| filter.admits(r))
            .collect();

        Ok(ReportPage { reports, next_cursor })
    }

    async fn get_report(&self, id: &str) -> Result<Option<ReportRef>, SinkError> {
        let data: ReportData = self
            .execute("report", &format!("{REPORT_QUERY}\n{REPORT_FIELDS}"), json!({ "id": id }))
            .await?;
        Ok(data.report.map(ReportRef::from))
    }
}

#[async_trait]
impl ReportSink for OpenCtiClient {
    async fn attach_file(&self, report_id: &str, filename: &str, bytes: Vec<u8>, mime: &str) -> Result<(), SinkError> {
        let operations = json!({
            "query": IMPORT_MUTATION,
            "variables": { "reportId": report_id, "file": null },
        });
        let size = bytes.len();
        let file = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let form = Form::new()
            .text("operations", operations.to_string())
            .text("map", json!({ "0": ["variables.file"] }).to_string())
            .part("0", file);

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let _: Value = decode("importPush", response).await?;

        info!(report_id, filename, size, "file attached");
        Ok(())
    }

    async fn update_description(&self, report_id: &str, text: &str) -> Result<(), SinkError> {
        let _: Value = self
            .execute(
                "fieldPatch",
                DESCRIPTION_MUTATION,
                json!({ "id": report_id, "input": [{ "key": "description", "value": [text] }] }),
            )
            .await?;
        Ok(())
    }

    async fn set_label(&self, report_id: &str, name: &str, color: &str) -> Result<(), SinkError> {
        let data: LabelAddData = self
            .execute("labelAdd", LABEL_ADD_MUTATION, json!({ "input": { "value": name, "color": color } }))
            .await?;
        let label = data.label_add.ok_or_else(|| SinkError::Rejected {
            operation: "labelAdd",
            message: format!("label {name} was not created"),
        })?;

        let _: Value = self
            .execute(
                "relationAdd",
                LABEL_RELATION_MUTATION,
                json!({ "id": report_id, "input": { "toId": label.id, "relationship_type": "object-label" } }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_node_maps_to_report_ref() {
        let raw = json!({
            "data": { "reports": {
                "edges": [{ "node": {
                    "id": "report--1",
                    "name": "Weekly digest",
                    "description": null,
                    "report_types": ["threat-report"],
                    "objectLabel": [{ "id": "l1", "value": "rss-enhanced", "color": "#ff9900" }],
                    "externalReferences": { "edges": [{ "node": { "url": "https://blog.example.com/x" } }, { "node": { "url": null } }] }
                }}],
                "pageInfo": { "endCursor": "abc", "hasNextPage": true }
            }}
        });

        let response: GraphQlResponse<ReportsData> = serde_json::from_value(raw).unwrap();
        let data = into_data("reports", response).unwrap();
        assert!(data.reports.page_info.as_ref().is_some_and(|p| p.has_next_page));

        let report = ReportRef::from(data.reports.edges.into_iter().next().unwrap().node);
        assert_eq!(report.id, "report--1");
        assert_eq!(report.description, "");
        assert_eq!(report.external_references, vec!["https://blog.example.com/x".to_string()]);
        assert!(report.has_label("rss-enhanced"));
    }

    #[test]
    fn graphql_errors_become_rejections() {
        let response: GraphQlResponse<Value> =
            serde_json::from_value(json!({ "data": null, "errors": [{ "message": "Forbidden" }] })).unwrap();
        let err = into_data("labelAdd", response).unwrap_err();
        assert!(matches!(err, SinkError::Rejected { operation: "labelAdd", ref message } if message == "Forbidden"));
    }

    #[test]
    fn endpoint_appends_graphql_path() {
        let client = OpenCtiClient::new("http://opencti:8080/", "token", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://opencti:8080/graphql");
    }
}
