use serde::Deserialize;

/// Body of `POST /process`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub request_id: String,
    pub filename: String,
}

/// Query of `GET /preview/{requestId}`
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub filename: String,
}
