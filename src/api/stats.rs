//! Dashboard stats endpoint

use super::client::AdminClient;
use super::error::ApiError;
use crate::models::AdminStats;

pub async fn fetch_stats(client: &AdminClient, token: &str) -> Result<AdminStats, ApiError> {
    client.get("/api/admin/stats", token, &[]).await
}
