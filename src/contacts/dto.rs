use serde::Deserialize;
use time::Date;

/// Full contact field set; used both for create and full-replace update.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub additional_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}
