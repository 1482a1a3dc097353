use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::render;

/// Errors a handler can end with. Visitors only ever see a short page.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type WebResult<T> = Result<T, WebError>;

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::NotFound => (StatusCode::NOT_FOUND, "Página não encontrada.".to_string()),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };
        let body = format!(
            "<main style=\"padding: 48px; text-align: center\"><h2>{}</h2><p>{}</p><p><a href=\"/\">Voltar</a></p></main>",
            status.as_u16(),
            render::html_escape(&message)
        );
        (status, Html(render::page("Erro", "/static/style.css", "site", &body))).into_response()
    }
}
