//! Ticket listing, detail and status/note updates

use reqwest::Method;

use super::client::{param, AdminClient};
use super::error::ApiError;
use crate::models::{AdminTicket, Page, StatusFilter, TicketEnvelope, TicketUpdate};

/// Filters for the ticket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub page: u32,
    pub limit: u32,
    pub q: String,
    pub status: StatusFilter,
}

impl TicketQuery {
    pub fn params(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("page", param(self.page)),
            ("limit", param(self.limit)),
            ("q", Some(self.q.clone())),
            ("status", param(self.status.as_query())),
        ]
    }
}

pub async fn list_tickets(
    client: &AdminClient,
    token: &str,
    query: &TicketQuery,
) -> Result<Page<AdminTicket>, ApiError> {
    client.get("/api/admin/tickets", token, &query.params()).await
}

pub async fn fetch_ticket(
    client: &AdminClient,
    token: &str,
    ticket_id: i64,
) -> Result<AdminTicket, ApiError> {
    let resp: TicketEnvelope = client
        .get(&format!("/api/admin/tickets/{}", ticket_id), token, &[])
        .await?;
    Ok(resp.ticket)
}

/// PATCH status and/or note; returns the server's view of the ticket.
pub async fn update_ticket(
    client: &AdminClient,
    token: &str,
    ticket_id: i64,
    update: &TicketUpdate,
) -> Result<AdminTicket, ApiError> {
    if update.status.is_none() && update.admin_note.is_none() {
        return Err(ApiError::validation("Nothing to update."));
    }
    let body = serde_json::to_value(update)
        .map_err(|e| ApiError::validation(format!("Invalid ticket update: {}", e)))?;
    let resp: TicketEnvelope = client
        .send_json(
            Method::PATCH,
            &format!("/api/admin/tickets/{}", ticket_id),
            token,
            body,
        )
        .await?;
    Ok(resp.ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;
    use mockito::Matcher;
    use std::time::Duration;

    const TICKET_JSON: &str = r#"{"ticket":{"id":4,"ticket_key":"T-4","status":"resolved",
        "subject":"Broken upload","description":null,"admin_note":"fixed",
        "user":{"id":1,"email":"a@x.com"},"session":{"session_id":"s1","title":null},
        "attachment":null}}"#;

    #[test]
    fn test_all_status_is_sent_as_all() {
        let query = TicketQuery {
            page: 1,
            limit: 20,
            ..Default::default()
        };
        let params = query.params();
        assert_eq!(params[3], ("status", Some("all".to_string())));
    }

    #[tokio::test]
    async fn test_update_ticket_patches_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/api/admin/tickets/4")
            .match_body(Matcher::Json(
                serde_json::json!({ "status": "resolved", "admin_note": "fixed" }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TICKET_JSON)
            .create_async()
            .await;

        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));
        let ticket = update_ticket(
            &client,
            "tok",
            4,
            &TicketUpdate {
                status: Some(TicketStatus::Resolved),
                admin_note: Some("fixed".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert_eq!(ticket.session.map(|s| s.session_id).as_deref(), Some("s1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_update_rejected_locally() {
        let client = AdminClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(1));
        let err = update_ticket(&client, "tok", 4, &TicketUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
