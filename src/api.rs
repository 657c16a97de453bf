use crate::error::FetchError;
use crate::models::{ApiEvent, EventDraft, EventId, EventRecord};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can supply the full event collection.
pub trait EventSource {
    fn fetch_events(&self) -> impl Future<Output = Result<Vec<EventRecord>, FetchError>> + Send;
}

/// The organization a session belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub email: String,
    pub organization_name: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Credentials for the protected endpoints. Passed explicitly to every call
/// that needs one; nothing keeps a global login.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Session {
    token: String,
    pub user: Organization,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Organization) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    pub fn owns(&self, event: &EventRecord) -> bool {
        event.owner_id == Some(self.user.id)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the charity event API.
pub struct EventClient {
    client: Client,
    base_url: String,
}

impl EventClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        req.bearer_auth(&session.token)
    }

    pub async fn fetch_event(&self, id: EventId) -> Result<EventRecord, FetchError> {
        let res = self.client.get(self.url(&format!("/events/{id}"))).send().await?;
        let raw: ApiEvent = decode(res).await?;
        Ok(raw.into())
    }

    /// Events created by the session's organization.
    pub async fn fetch_my_events(&self, session: &Session) -> Result<Vec<EventRecord>, FetchError> {
        let req = self.authed(self.client.get(self.url("/my-events")), session);
        let raw: Vec<ApiEvent> = decode(req.send().await?).await?;
        Ok(raw.into_iter().map(EventRecord::from).collect())
    }

    /// Creates an event hosted by the session's organization.
    ///
    /// # Errors
    ///
    /// [`FetchError::Invalid`] if the draft has no selected location or is
    /// missing a required field; nothing is sent in that case.
    pub async fn create_event(
        &self,
        session: &Session,
        draft: &EventDraft,
    ) -> Result<EventRecord, FetchError> {
        let payload = draft.to_payload()?;
        let req = self.authed(self.client.post(self.url("/events")), session).json(&payload);
        let raw: ApiEvent = decode(req.send().await?).await?;
        info!("Created event {} '{}'", raw.id, raw.name);
        Ok(raw.into())
    }

    pub async fn update_event(
        &self,
        session: &Session,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<EventRecord, FetchError> {
        let payload = draft.to_payload()?;
        let req = self
            .authed(self.client.put(self.url(&format!("/events/{id}"))), session)
            .json(&payload);
        let raw: ApiEvent = decode(req.send().await?).await?;
        info!("Updated event {}", id);
        Ok(raw.into())
    }

    pub async fn delete_event(&self, session: &Session, id: EventId) -> Result<(), FetchError> {
        let req = self.authed(self.client.delete(self.url(&format!("/events/{id}"))), session);
        let _: serde_json::Value = decode(req.send().await?).await?;
        info!("Deleted event {}", id);
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, FetchError> {
        let req = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });
        let session: Session = decode(req.send().await?).await?;
        info!("Signed in as {}", session.user.organization_name);
        Ok(session)
    }

    pub async fn current_user(&self, session: &Session) -> Result<Organization, FetchError> {
        let req = self.authed(self.client.get(self.url("/auth/me")), session);
        decode(req.send().await?).await
    }
}

impl EventSource for EventClient {
    async fn fetch_events(&self) -> Result<Vec<EventRecord>, FetchError> {
        let res = self.client.get(self.url("/events")).send().await?;
        let raw: Vec<ApiEvent> = decode(res).await?;
        debug!("Fetched {} events", raw.len());
        Ok(raw.into_iter().map(EventRecord::from).collect())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(res: Response) -> Result<T, FetchError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Builds a status error, preferring the server's `{ "error": ... }` message.
fn status_error(status: u16, body: &str) -> FetchError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no details".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    FetchError::Status { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const EVENT_7: &str = r#"{"id": 7, "name": "Blood drive", "host": "Org", "date": "2026-10-30",
        "location": "Library", "latitude": 40.0, "longitude": -75.0, "user_id": 1}"#;

    /// Answers a single request with `status` and `body`, returning the raw
    /// request text once it has been served.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request_complete(&request) {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + content_length
    }

    fn client(base_url: &str) -> EventClient {
        EventClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    fn session(token: &str) -> Session {
        Session::new(
            token,
            Organization {
                id: 1,
                email: "a@b.org".into(),
                organization_name: "Org".into(),
                is_admin: false,
            },
        )
    }

    fn draft() -> EventDraft {
        EventDraft {
            name: "Blood drive".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 30),
            location_label: "Library".into(),
            coordinate: Some(Coordinate::new(40.0, -75.0).unwrap()),
            description: String::new(),
            contact_info: None,
        }
    }

    #[tokio::test]
    async fn fetch_events_keeps_events_without_coordinates() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"[{"id": 1, "name": "Food drive", "host": "Pantry", "date": "2026-11-01",
                 "location": "Church", "latitude": 39.95, "longitude": -75.16},
                {"id": 2, "name": "Coat drive", "host": "Shelter", "date": "2026-11-02",
                 "location": "TBD", "latitude": null, "longitude": -75.1}]"#,
        )
        .await;

        let events = client(&base_url).fetch_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].coordinate.map(|c| c.lat()), Some(39.95));
        assert_eq!(events[1].id, 2);
        assert_eq!(events[1].coordinate, None);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /events "), "{request}");
    }

    #[tokio::test]
    async fn my_events_sends_bearer_token() {
        let (base_url, server) = serve_once("200 OK", "[]").await;
        let events = client(&base_url)
            .fetch_my_events(&session("tok-123"))
            .await
            .unwrap();
        assert!(events.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /my-events "), "{request}");
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer tok-123"));
    }

    #[tokio::test]
    async fn update_event_puts_payload_to_event_path() {
        let (base_url, server) = serve_once("200 OK", EVENT_7).await;
        let updated = client(&base_url)
            .update_event(&session("t"), 7, &draft())
            .await
            .unwrap();
        assert_eq!(updated.id, 7);
        assert_eq!(updated.coordinate, Some(Coordinate::new(40.0, -75.0).unwrap()));

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /events/7 "), "{request}");
        assert!(request.contains(r#""name":"Blood drive""#));
        assert!(request.contains(r#""description":"No description provided.""#));
    }

    #[tokio::test]
    async fn delete_event_uses_event_path() {
        let (base_url, server) = serve_once("200 OK", r#"{"message": "Event deleted"}"#).await;
        client(&base_url).delete_event(&session("t"), 7).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /events/7 "), "{request}");
    }

    #[tokio::test]
    async fn forbidden_update_surfaces_server_message() {
        let (base_url, server) = serve_once(
            "403 Forbidden",
            r#"{"error": "You can only edit your own events"}"#,
        )
        .await;
        let err = client(&base_url)
            .update_event(&session("t"), 7, &draft())
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "You can only edit your own events");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn login_then_current_user() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"token": "jwt-1", "user": {"id": 1, "email": "a@b.org",
                "organization_name": "Org"}}"#,
        )
        .await;
        let session = client(&base_url).login("a@b.org", "secret").await.unwrap();
        assert_eq!(session.user.organization_name, "Org");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /auth/login "), "{request}");
        assert!(request.contains(r#""email":"a@b.org""#));

        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"id": 1, "email": "a@b.org", "organization_name": "Org", "is_admin": true}"#,
        )
        .await;
        let me = client(&base_url).current_user(&session).await.unwrap();
        assert!(me.is_admin);
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /auth/me "), "{request}");
        assert!(request.to_ascii_lowercase().contains("authorization: bearer jwt-1"));
    }

    #[test]
    fn status_error_prefers_server_message() {
        let err = status_error(403, r#"{"error": "You can only edit your own events"}"#);
        assert_eq!(
            err.to_string(),
            "server responded 403: You can only edit your own events"
        );
        assert!(!err.is_unauthorized());
        assert!(status_error(401, r#"{"error": "Token is missing"}"#).is_unauthorized());
    }

    #[test]
    fn status_error_falls_back_to_body_text() {
        match status_error(502, "  Bad Gateway \n") {
            FetchError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match status_error(500, "") {
            FetchError::Status { message, .. } => assert_eq!(message, "no details"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn login_response_decodes_into_session() {
        let session: Session = serde_json::from_str(
            r#"{"token": "abc.def", "user": {"id": 4, "email": "a@b.org",
                "organization_name": "Helping Hands", "is_admin": false}}"#,
        )
        .unwrap();
        assert_eq!(session.user.organization_name, "Helping Hands");

        let mine = EventRecord::from(ApiEvent {
            id: 1,
            name: "Drive".into(),
            host: "Helping Hands".into(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            location: "Hall".into(),
            latitude: None,
            longitude: None,
            description: None,
            contact_info: None,
            user_id: Some(4),
        });
        assert!(session.owns(&mine));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = EventClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/events"), "http://localhost:5000/events");
    }

    #[test]
    fn invalid_draft_is_rejected_before_sending() {
        let client = EventClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let session = Session::new(
            "t",
            Organization {
                id: 1,
                email: "a@b.org".into(),
                organization_name: "Org".into(),
                is_admin: false,
            },
        );
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt
            .block_on(client.create_event(&session, &EventDraft::default()))
            .unwrap_err();
        assert!(matches!(err, FetchError::Invalid(_)));
    }
}
