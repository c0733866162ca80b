use serde_json::json;
use trellis_redmine::{IssueDraft, IssueFilter, IssueUpdate, RedmineClient};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_projects_sends_api_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects.json"))
        .and(header("X-Redmine-API-Key", "secret"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [
                {"id": 37, "name": "Ni-kshay Setu Revamp", "identifier": "nikshay-setu"},
                {"id": 5, "name": "Internal Tools"}
            ]
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let projects = client.list_projects(20).await.unwrap();

    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].id, 37);
    assert_eq!(projects[1].identifier, None);
}

#[tokio::test]
async fn list_issues_applies_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issues.json"))
        .and(query_param("project_id", "37"))
        .and(query_param("status_id", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [{
                "id": 101,
                "subject": "Login fails",
                "status": {"id": 1, "name": "New"},
                "project": {"id": 37, "name": "Ni-kshay Setu Revamp"}
            }]
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let filter = IssueFilter {
        project_id: Some(37),
        status_id: Some("open".to_string()),
        ..Default::default()
    };
    let issues = client.list_issues(&filter).await.unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].status.as_ref().unwrap().name, "New");
}

#[tokio::test]
async fn create_issue_posts_wrapped_draft() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/issues.json"))
        .and(body_json(json!({
            "issue": {
                "project_id": 37,
                "subject": "Crash on save",
                "description": "Editor crashes when saving drafts",
                "tracker_id": 1,
                "priority_id": 4
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "issue": {"id": 202, "subject": "Crash on save"}
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let mut draft = IssueDraft::new(37, "Crash on save");
    draft.description = "Editor crashes when saving drafts".to_string();
    draft.priority_id = 4;

    let issue = client.create_issue(&draft).await.unwrap();
    assert_eq!(issue.id, 202);
}

#[tokio::test]
async fn update_issue_handles_empty_response_body() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/issues/202.json"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let update = IssueUpdate {
        status_id: Some(5),
        ..Default::default()
    };
    client.update_issue(202, &update).await.unwrap();
}

#[tokio::test]
async fn empty_update_skips_the_request() {
    // No mock mounted: a request would fail the test.
    let server = MockServer::start().await;
    let client = RedmineClient::new(server.uri(), "secret");
    client.update_issue(1, &IssueUpdate::default()).await.unwrap();
}

#[tokio::test]
async fn error_status_carries_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issues/999.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Issue not found"))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let err = client.get_issue(999).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("404"));
    assert!(msg.contains("Issue not found"));
}

#[tokio::test]
async fn validate_connection_returns_current_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/current.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 1, "login": "admin", "firstname": "Ada", "lastname": "Admin"}
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(server.uri(), "secret");
    let user = client.validate_connection().await.unwrap();
    assert_eq!(user.login.as_deref(), Some("admin"));
}
