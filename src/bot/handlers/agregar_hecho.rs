use super::{call, field, is_iso_date, pipe_fields, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, NuevoHecho};
use crate::backend::Backend;
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use reqwest::Method;
use serde_json::Value;

const COMMAND: &str = "/agregar_hecho";
const USAGE: &str = "Uso:\n/agregar_hecho <coleccion> | <titulo> | [categoria] | [ubicacion] | [fechaISO] | [origen]";

/// `/agregar_hecho`: creates a hecho in a collection
pub struct AgregarHechoHandler {
    fuentes: Backend,
}

impl AgregarHechoHandler {
    /// Create the handler over the source service
    #[must_use]
    pub const fn new(fuentes: Backend) -> Self {
        Self { fuentes }
    }

    async fn create(&self, chat_id: i64, hecho: NuevoHecho) -> Result<Vec<OutboundMessage>, HandlerError> {
        let body = serde_json::to_value(&hecho)?;
        let request = self.fuentes.request(Method::POST, &["hecho"]).json(body);
        let response = call(&self.fuentes, &request).await?;

        let created: Value = response.json().unwrap_or(Value::Null);
        let id = created
            .get("id")
            .filter(|v| !v.is_null())
            .or_else(|| created.get("hechoId"));

        Ok(vec![OutboundMessage::plain(
            chat_id,
            format!(
                "Hecho creado\nID: {}\nTítulo: {}\nColección: {}",
                display_id(id, "?"),
                hecho.titulo,
                hecho.nombre_coleccion
            ),
        )])
    }
}

/// Parse the pipe-separated arguments into a request body
pub(crate) fn parse_args(args: &str) -> Result<NuevoHecho, HandlerError> {
    let fields = pipe_fields(args);
    let (Some(nombre_coleccion), Some(titulo)) = (field(&fields, 0), field(&fields, 1)) else {
        return Err(HandlerError::Usage(USAGE.to_string()));
    };

    let fecha = field(&fields, 4);
    if let Some(fecha) = fecha.as_deref().filter(|f| !is_iso_date(f)) {
        return Err(HandlerError::Usage(format!(
            "❗ La fecha '{fecha}' no está en formato ISO (ej. 2024-05-01 o 2024-05-01T10:30:00).\n\n{USAGE}"
        )));
    }

    Ok(NuevoHecho {
        nombre_coleccion,
        titulo,
        categoria: field(&fields, 2),
        ubicacion: field(&fields, 3),
        fecha,
        origen: field(&fields, 5),
    })
}

#[async_trait::async_trait]
impl CommandHandler for AgregarHechoHandler {
    fn name(&self) -> &'static str {
        "agregar_hecho"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text) if matches_command(text, COMMAND))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let ctx = ErrorContext::new(
            "fuentes",
            "❗ No se encontró el servicio de fuentes.",
            "No pude crear el hecho",
        );

        let result = match parse_args(split_command(text).1) {
            Ok(hecho) => self.create(chat_id, hecho).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}
