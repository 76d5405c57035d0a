//! Chat command handlers
//!
//! One handler per command family. Every handler converts its failures into
//! user-facing messages through [`HandlerError::into_messages`], so nothing
//! escapes past the router.

mod agregar_hecho;
mod agregar_pdi;
mod ayuda;
mod buscar;
mod cambiar_estado;
mod hechos;
mod solicitar_borrado;
mod ver_hecho;

pub use agregar_hecho::AgregarHechoHandler;
pub use agregar_pdi::AgregarPdiHandler;
pub use ayuda::AyudaHandler;
pub use buscar::BuscarHandler;
pub use cambiar_estado::CambiarEstadoHandler;
pub use hechos::HechosHandler;
pub use solicitar_borrado::SolicitarBorradoHandler;
pub use ver_hecho::VerHechoHandler;

use super::event::OutboundMessage;
use super::pagination::MalformedTokenError;
use super::registry::HandlerRegistry;
use super::router::UNEXPECTED_ERROR;
use crate::backend::{Backend, BackendRequest, BackendResponse, Backends, NetworkError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, warn};

/// Build the registry with every command, most specific first
#[must_use]
pub fn default_registry(backends: &Backends) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(AyudaHandler));
    registry.register(Box::new(HechosHandler::new(backends.agregador.clone())));
    registry.register(Box::new(BuscarHandler::new(backends.busqueda.clone())));
    registry.register(Box::new(AgregarHechoHandler::new(backends.fuentes.clone())));
    registry.register(Box::new(AgregarPdiHandler::new(backends.fuentes.clone())));
    registry.register(Box::new(VerHechoHandler::new(backends.fuentes.clone())));
    registry.register(Box::new(CambiarEstadoHandler::new(
        backends.solicitudes.clone(),
    )));
    registry.register(Box::new(SolicitarBorradoHandler::new(
        backends.solicitudes.clone(),
    )));
    registry
}

/// Everything that can go wrong inside a handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Missing or malformed arguments; the payload is the reply
    #[error("usage: {0}")]
    Usage(String),
    /// The backend could not be reached
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// The backend answered with a non-2xx status
    #[error("backend returned HTTP {status}: {detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `error` field or raw body
        detail: String,
    },
    /// Callback data that does not decode
    #[error(transparent)]
    MalformedToken(#[from] MalformedTokenError),
    /// Anything else, e.g. a 2xx body that does not decode
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Unexpected(format!("invalid JSON from backend: {e}"))
    }
}

impl HandlerError {
    /// Capture a non-2xx response
    #[must_use]
    pub fn from_status(response: &BackendResponse) -> Self {
        Self::Status {
            status: response.status,
            detail: response.error_detail(),
        }
    }

    /// The reply for this error, or `None` when it must be dropped silently
    #[must_use]
    pub fn render(&self, ctx: &ErrorContext) -> Option<String> {
        match self {
            Self::Usage(text) => Some(text.clone()),
            Self::Network(NetworkError::Timeout(_)) => Some(format!(
                "⏳ El servicio de {} está tardando demasiado en responder. Probá de nuevo en unos minutos.",
                ctx.service
            )),
            Self::Network(NetworkError::Other(_)) => Some(format!(
                "Error de conexión: No se pudo contactar al servidor de {}.",
                ctx.service
            )),
            Self::Status { status: 404, .. } => Some(ctx.not_found.clone()),
            Self::Status {
                status: 400,
                detail,
            } => Some(format!("❗ {} (HTTP 400).\n{detail}", ctx.failure)),
            Self::Status { status, .. } => Some(format!("❗ {} (HTTP {status}).", ctx.failure)),
            Self::MalformedToken(_) => None,
            Self::Unexpected(_) => Some(UNEXPECTED_ERROR.to_string()),
        }
    }

    /// Log the error and turn it into messages for `chat_id`
    #[must_use]
    pub fn into_messages(self, chat_id: i64, ctx: &ErrorContext) -> Vec<OutboundMessage> {
        match &self {
            Self::Usage(_) => {}
            Self::MalformedToken(e) => warn!(chat_id, "Dropping malformed callback: {e}"),
            Self::Unexpected(e) => error!(chat_id, service = ctx.service, "Handler failed: {e}"),
            other => warn!(chat_id, service = ctx.service, "Backend call failed: {other}"),
        }
        self.render(ctx)
            .map(|text| vec![OutboundMessage::plain(chat_id, text)])
            .unwrap_or_default()
    }
}

/// Per-command wording for [`HandlerError::render`]
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Human name of the backend ("colecciones", "PDIs"...)
    pub service: &'static str,
    /// Reply for HTTP 404
    pub not_found: String,
    /// Start of the reply for other error statuses
    pub failure: &'static str,
}

impl ErrorContext {
    /// Create a context
    #[must_use]
    pub fn new(service: &'static str, not_found: impl Into<String>, failure: &'static str) -> Self {
        Self {
            service,
            not_found: not_found.into(),
            failure,
        }
    }
}

/// Execute `request` and reject non-2xx statuses
pub(crate) async fn call(
    backend: &Backend,
    request: &BackendRequest,
) -> Result<BackendResponse, HandlerError> {
    let response = backend.execute(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(HandlerError::from_status(&response))
    }
}

/// Decode a successful body
pub(crate) fn decode<T: DeserializeOwned>(response: &BackendResponse) -> Result<T, HandlerError> {
    Ok(response.json()?)
}

/// Split `a | b | | c` into trimmed fields; blank fields become `None`
pub(crate) fn pipe_fields(args: &str) -> Vec<Option<String>> {
    args.split('|')
        .map(|field| {
            let field = field.trim();
            (!field.is_empty()).then(|| field.to_string())
        })
        .collect()
}

/// Field `index` of [`pipe_fields`] output, if present and non-blank
pub(crate) fn field(fields: &[Option<String>], index: usize) -> Option<String> {
    fields.get(index).cloned().flatten()
}

/// Accepts `2024-05-01`, `2024-05-01T10:30`, `2024-05-01T10:30:00` and RFC 3339
pub(crate) fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}
