// Row access over the REST table endpoint, keyed by `id`
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiError, BackendClient, Result};
use crate::retry::with_retry;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

impl BackendClient {
    fn table_url(&self, table: &str) -> String {
        self.endpoint(&format!("rest/v1/{}", urlencoding::encode(table)))
    }

    /// Fetch exactly one row by id
    pub async fn select_row(&self, table: &str, id: &str) -> Result<Value> {
        let url = self.table_url(table);
        let filter = format!("eq.{}", id);

        with_retry(&self.retry_config, || async {
            let response = self
                .request(Method::GET, &url)
                .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
                .query(&[("id", filter.as_str()), ("select", "*")])
                .send()
                .await?;
            let response = Self::check(response, &format!("{} row {}", table, id)).await?;
            Ok(response.json().await?)
        })
        .await
    }

    /// Patch the row with the given id and return the updated row
    ///
    /// Row level security hides rows the caller may not touch, which shows up
    /// as an empty result rather than an error status.
    pub async fn update_row(&self, table: &str, id: &str, patch: &Value) -> Result<Value> {
        let url = self.table_url(table);
        let filter = format!("eq.{}", id);
        debug!("Updating {} row {}", table, id);

        let rows: Vec<Value> = with_retry(&self.retry_config, || async {
            let response = self
                .request(Method::PATCH, &url)
                .header("Prefer", "return=representation")
                .query(&[("id", filter.as_str())])
                .json(patch)
                .send()
                .await?;
            let response = Self::check(response, &format!("update {} row {}", table, id)).await?;
            Ok(response.json().await?)
        })
        .await?;

        first_row(rows, table, id)
    }

    /// Insert a single row and return it as stored
    pub async fn insert_row(&self, table: &str, row: &Value) -> Result<Value> {
        let url = self.table_url(table);

        // Single attempt: a retry after a lost response would insert twice
        let response = self
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let response = Self::check(response, &format!("insert into {}", table)).await?;
        let rows: Vec<Value> = response.json().await?;

        first_row(rows, table, "new")
    }
}

fn first_row(rows: Vec<Value>, table: &str, id: &str) -> Result<Value> {
    rows.into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(format!("{} row {}", table, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_url_is_encoded() {
        let client = BackendClient::new("https://example.supabase.co", "anon").unwrap();
        assert_eq!(
            client.table_url("advertisers"),
            "https://example.supabase.co/rest/v1/advertisers"
        );
        assert_eq!(
            client.table_url("odd name"),
            "https://example.supabase.co/rest/v1/odd%20name"
        );
    }

    #[test]
    fn test_first_row_empty_is_not_found() {
        let err = first_row(Vec::new(), "profiles", "u-1").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref what) if what == "profiles row u-1"));

        let row = first_row(vec![json!({"id": "u-1"})], "profiles", "u-1").unwrap();
        assert_eq!(row["id"], "u-1");
    }
}
