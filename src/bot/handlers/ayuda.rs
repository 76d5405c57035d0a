use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::registry::{matches_command, CommandHandler};

const HELP_TEXT: &str = "\
Comandos disponibles:

/hechos <coleccion> - lista los hechos de una colección
/buscar \"<palabra>\"[, tag: \"<tag>\"] - busca hechos por palabra clave
/hecho <id> - muestra un hecho y sus PDIs
/agregar_hecho <coleccion> | <titulo> | [categoria] | [ubicacion] | [fechaISO] | [origen]
/agregar_pdi <hechoId> | <descripcion> | [lugar] | [momentoISO] | [urlImagen] | [textoImagen] | [etiquetas,...]
/cambiar_estado <solicitudId> <ACEPTADA|RECHAZADA|CREADA>
/solicitar_borrado <hechoId> <descripcion (≥500 caracteres)>";

/// `/start` and `/ayuda`
pub struct AyudaHandler;

#[async_trait::async_trait]
impl CommandHandler for AyudaHandler {
    fn name(&self) -> &'static str {
        "ayuda"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text)
            if matches_command(text, "/start") || matches_command(text, "/ayuda"))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        vec![OutboundMessage::plain(event.chat_id(), HELP_TEXT)]
    }
}
