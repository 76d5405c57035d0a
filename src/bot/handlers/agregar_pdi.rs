use super::{call, field, is_iso_date, pipe_fields, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, NuevoPdi};
use crate::backend::Backend;
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use reqwest::Method;
use serde_json::Value;

const COMMAND: &str = "/agregar_pdi";
const USAGE: &str = "Uso:\n/agregar_pdi <hechoId> | <descripcion> | [lugar] | [momentoISO] | [urlImagen] | [textoImagen] | [etiquetas,...]";

/// `/agregar_pdi`: attaches a point of interest to a hecho
pub struct AgregarPdiHandler {
    fuentes: Backend,
}

impl AgregarPdiHandler {
    /// Create the handler over the source service
    #[must_use]
    pub const fn new(fuentes: Backend) -> Self {
        Self { fuentes }
    }

    async fn create(&self, chat_id: i64, pdi: NuevoPdi) -> Result<Vec<OutboundMessage>, HandlerError> {
        let body = serde_json::to_value(&pdi)?;
        let request = self.fuentes.request(Method::POST, &["pdis"]).json(body);
        let response = call(&self.fuentes, &request).await?;

        let created: Value = response.json().unwrap_or(Value::Null);
        let id = created
            .get("id")
            .filter(|v| !v.is_null())
            .or_else(|| created.get("pdi_id"));

        Ok(vec![OutboundMessage::plain(
            chat_id,
            format!(
                "PDI agregado al hecho {}\nID: {}\nDescripción: {}",
                pdi.hecho_id,
                display_id(id, "?"),
                pdi.descripcion
            ),
        )])
    }
}

/// Parse the pipe-separated arguments into a request body
pub(crate) fn parse_args(args: &str) -> Result<NuevoPdi, HandlerError> {
    let fields = pipe_fields(args);
    let (Some(hecho_id), Some(descripcion)) = (field(&fields, 0), field(&fields, 1)) else {
        return Err(HandlerError::Usage(USAGE.to_string()));
    };

    let momento = field(&fields, 3);
    if let Some(momento) = momento.as_deref().filter(|m| !is_iso_date(m)) {
        return Err(HandlerError::Usage(format!(
            "❗ El momento '{momento}' no está en formato ISO (ej. 2024-05-01T10:30:00).\n\n{USAGE}"
        )));
    }

    let etiquetas = field(&fields, 6)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(NuevoPdi {
        hecho_id,
        descripcion,
        lugar: field(&fields, 2),
        momento,
        url_imagen: field(&fields, 4),
        texto_imagen: field(&fields, 5),
        etiquetas,
    })
}

#[async_trait::async_trait]
impl CommandHandler for AgregarPdiHandler {
    fn name(&self) -> &'static str {
        "agregar_pdi"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text) if matches_command(text, COMMAND))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let args = split_command(text).1;
        let hecho_id = field(&pipe_fields(args), 0).unwrap_or_default();
        let ctx = ErrorContext::new(
            "fuentes",
            format!("❗ No se encontró el hecho {hecho_id}."),
            "No se pudo agregar el PDI",
        );

        let result = match parse_args(args) {
            Ok(pdi) => self.create(chat_id, pdi).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_command() {
        let pdi = parse_args("12 | Foto | Plaza | 2024-05-01T10:30 | https://img.test/a.png | cartel | a, b ,, c")
            .expect("valid");
        assert_eq!(pdi.hecho_id, "12");
        assert_eq!(pdi.etiquetas, vec!["a", "b", "c"]);

        let body = serde_json::to_value(&pdi).expect("serializable");
        assert_eq!(
            body,
            json!({
                "hecho_id": "12",
                "descripcion": "Foto",
                "lugar": "Plaza",
                "momento": "2024-05-01T10:30",
                "url_imagen": "https://img.test/a.png",
                "texto_imagen": "cartel",
                "etiquetas": ["a", "b", "c"]
            })
        );
    }

    #[test]
    fn test_minimal_command_omits_optionals() {
        let pdi = parse_args("12|Foto").expect("valid");
        let body = serde_json::to_value(&pdi).expect("serializable");
        assert_eq!(body, json!({"hecho_id": "12", "descripcion": "Foto"}));
    }

    #[test]
    fn test_invalid_input_is_usage() {
        assert!(matches!(parse_args("12"), Err(HandlerError::Usage(_))));
        assert!(matches!(
            parse_args("12 | Foto | | mañana"),
            Err(HandlerError::Usage(_))
        ));
    }
}
