use super::{call, decode, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, HechoResumen};
use crate::backend::Backend;
use crate::bot::chunker::{fit_unit, Chunker};
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage, TextFormat};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use reqwest::Method;

const COMMAND: &str = "/hechos";
const USAGE: &str =
    "Por favor, especifica un ID (nombre) de colección. Ejemplo: /hechos miColeccion";

/// `/hechos <coleccion>`: lists the hechos of a collection
pub struct HechosHandler {
    agregador: Backend,
}

impl HechosHandler {
    /// Create the handler over the collection store
    #[must_use]
    pub const fn new(agregador: Backend) -> Self {
        Self { agregador }
    }

    async fn list(&self, chat_id: i64, coleccion: &str) -> Result<Vec<OutboundMessage>, HandlerError> {
        let request = self
            .agregador
            .request(Method::GET, &["colecciones", coleccion, "hechos"]);
        let response = call(&self.agregador, &request).await?;
        // Some deployments answer `null` for an empty collection
        let hechos: Option<Vec<HechoResumen>> = decode(&response)?;
        let hechos = hechos.unwrap_or_default();

        if hechos.is_empty() {
            return Ok(vec![OutboundMessage::plain(
                chat_id,
                format!("No se encontraron hechos para la colección: '{coleccion}'."),
            )]);
        }

        let chunker = Chunker::list();
        let header = format!("Hechos para '{coleccion}':\n\n");
        let units = std::iter::once(header).chain(hechos.iter().map(|hecho| {
            let unit = format!(
                "• Título: {}\n  (ID: {})\n\n",
                hecho.titulo.as_deref().unwrap_or("(sin título)"),
                display_id(hecho.id.as_ref(), "?"),
            );
            fit_unit(&unit, chunker.max_unit_len())
        }));

        Ok(chunker.chunk(chat_id, units, TextFormat::Plain))
    }
}

#[async_trait::async_trait]
impl CommandHandler for HechosHandler {
    fn name(&self) -> &'static str {
        "hechos"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text) if matches_command(text, COMMAND))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let Some(coleccion) = split_command(text).1.split_whitespace().next() else {
            return vec![OutboundMessage::plain(chat_id, USAGE)];
        };

        let ctx = ErrorContext::new(
            "colecciones",
            format!("Error: No se encontró una colección con el ID: '{coleccion}'."),
            "No se pudieron obtener los hechos",
        );
        self.list(chat_id, coleccion)
            .await
            .unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}
