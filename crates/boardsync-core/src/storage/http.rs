//! HTTP client for the board storage service.

use super::{ApiError, ApiResult, AppendOperation, BoardApi, BoardSnapshot, BoxFuture};
use crate::operation::Operation;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

/// Talks to `GET /boards/{id}` and `POST /boards/{id}/operations` under an
/// API root such as `http://127.0.0.1:8080/api`.
pub struct HttpBoardApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpBoardApi {
    pub fn new(base: &str, token: Option<String>) -> ApiResult<Self> {
        let base = Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ApiError::InvalidUrl(format!("Invalid HTTP URL scheme: {}", base.scheme())));
        }
        Ok(Self {
            client: Client::new(),
            base,
            token,
        })
    }

    /// `{base}/boards/{board_id}[/{suffix}]`
    pub fn board_url(&self, board_id: &str, suffix: Option<&str>) -> ApiResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?;
            segments.pop_if_empty().extend(["boards", board_id]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn check_status(response: reqwest::Response, board_id: &str) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(board_id.to_string()));
    }
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

impl BoardApi for HttpBoardApi {
    fn fetch_board(&self, board_id: &str) -> BoxFuture<'_, ApiResult<BoardSnapshot>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            let url = self.board_url(&board_id, None)?;
            log::debug!("GET {}", url);
            let response = self
                .authorize(self.client.get(url))
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            let response = check_status(response, &board_id).await?;
            response
                .json::<BoardSnapshot>()
                .await
                .map_err(|e| ApiError::Network(format!("Invalid board payload: {}", e)))
        })
    }

    fn append_operation(&self, board_id: &str, operation: &Operation) -> BoxFuture<'_, ApiResult<()>> {
        let board_id = board_id.to_string();
        let body = AppendOperation {
            operation: operation.clone(),
        };
        Box::pin(async move {
            let url = self.board_url(&board_id, Some("operations"))?;
            log::debug!("POST {} ({})", url, body.operation.id);
            let response = self
                .authorize(self.client.post(url))
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            check_status(response, &board_id).await?;
            Ok(())
        })
    }
}
