//! # Response Types
//!
//! ISAPI access-control response bodies.

use serde::Deserialize;
use serde_json::Value;

/// Search result page
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "UserInfoSearch")]
    pub search: SearchResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "searchID", default)]
    pub search_id: Option<String>,
    /// `OK`, `MORE` or `NO MATCH`
    #[serde(rename = "responseStatusStrg")]
    pub status: String,
    #[serde(default)]
    pub num_of_matches: u32,
    #[serde(default)]
    pub total_matches: u32,
    /// Raw user records, normalized later
    #[serde(rename = "UserInfo", default)]
    pub user_info: Vec<Value>,
}

impl SearchResult {
    pub fn has_more(&self) -> bool {
        self.status.eq_ignore_ascii_case("MORE")
    }
}

/// Status body returned by write endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status_code: Option<i64>,
    pub status_string: Option<String>,
    pub sub_status_code: Option<String>,
    pub error_msg: Option<String>,
}

impl StatusResponse {
    /// A missing status code counts as success
    pub fn is_success(&self) -> bool {
        self.status_code.is_none_or(|code| code == 1)
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(code) = self.status_code {
            parts.push(format!("statusCode={code}"));
        }
        if let Some(status) = &self.status_string {
            parts.push(status.clone());
        }
        if let Some(sub) = &self.sub_status_code {
            parts.push(sub.clone());
        }
        if let Some(msg) = &self.error_msg {
            parts.push(msg.clone());
        }
        parts.join(" ")
    }
}
