//! JSON shapes exchanged with the MetaMapa backends.
//!
//! Every response type tolerates unknown fields and missing optional ones.
//! Identifiers are kept as raw JSON values because the services disagree on
//! whether they are numbers or strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Render a JSON scalar for display: strings without quotes, `null` as empty.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render an optional identifier, falling back to `default`
#[must_use]
pub fn display_id(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(v) => display_value(v),
    }
}

/// Hecho as listed by a collection or returned by the search index
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HechoResumen {
    /// Identifier
    #[serde(default)]
    pub id: Option<Value>,
    /// Title
    #[serde(default)]
    pub titulo: Option<String>,
    /// Tags, only present in search results
    #[serde(default)]
    pub etiquetas: Vec<Value>,
}

/// Spring-style page envelope returned by the search index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    /// Zero-based page number
    #[serde(default)]
    pub number: u32,
    /// Total number of pages
    #[serde(default)]
    pub total_pages: u32,
    /// Total number of items
    #[serde(default)]
    pub total_elements: u64,
}

/// Full hecho returned by `GET /hecho/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HechoDetalle {
    /// Identifier
    #[serde(default)]
    pub id: Option<Value>,
    /// Title
    #[serde(default)]
    pub titulo: Option<String>,
    /// Owning collection
    #[serde(default, rename = "nombreColeccion", alias = "nombre_coleccion")]
    pub nombre_coleccion: Option<Value>,
    /// Category
    #[serde(default)]
    pub categoria: Option<Value>,
    /// Location, free-form
    #[serde(default)]
    pub ubicacion: Option<Value>,
    /// Date, free-form
    #[serde(default)]
    pub fecha: Option<Value>,
    /// Origin
    #[serde(default)]
    pub origen: Option<Value>,
}

impl HechoDetalle {
    /// A body like `{}` carries no hecho at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.as_ref().is_none_or(Value::is_null) && self.titulo.is_none()
    }
}

/// Point of interest attached to a hecho
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pdi {
    /// Identifier
    #[serde(default)]
    pub id: Option<Value>,
    /// Description
    #[serde(default)]
    pub descripcion: Option<String>,
    /// Place
    #[serde(default)]
    pub lugar: Option<String>,
    /// Moment, either an ISO string or a `[y, m, d, h, min, ...]` array
    #[serde(default)]
    pub momento: Option<Value>,
    /// Image URL
    #[serde(default)]
    pub url_imagen: Option<String>,
    /// Text extracted from the image
    #[serde(default)]
    pub texto_imagen: Option<String>,
    /// Tags
    #[serde(default)]
    pub etiquetas: Vec<Value>,
}

/// Deletion request as returned by the moderation service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Solicitud {
    /// Identifier
    #[serde(default)]
    pub id: Option<Value>,
    /// Target hecho
    #[serde(default, rename = "hechoId", alias = "hecho_id")]
    pub hecho_id: Option<Value>,
    /// Current status
    #[serde(default)]
    pub estado: Option<String>,
}

/// Body of `POST /hecho`
#[derive(Debug, Clone, Serialize)]
pub struct NuevoHecho {
    /// Target collection
    pub nombre_coleccion: String,
    /// Title
    pub titulo: String,
    /// Category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    /// Location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ubicacion: Option<String>,
    /// ISO date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,
    /// Origin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origen: Option<String>,
}

/// Body of `POST /pdis`
#[derive(Debug, Clone, Serialize)]
pub struct NuevoPdi {
    /// Owning hecho
    pub hecho_id: String,
    /// Description
    pub descripcion: String,
    /// Place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lugar: Option<String>,
    /// ISO moment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momento: Option<String>,
    /// Image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_imagen: Option<String>,
    /// Text extracted from the image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texto_imagen: Option<String>,
    /// Tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub etiquetas: Vec<String>,
}

/// Body of `POST {solicitudes}`
#[derive(Debug, Clone, Serialize)]
pub struct NuevaSolicitud {
    /// Justification, at least 500 characters
    pub descripcion: String,
    /// Initial status, always `CREADA`
    pub estado: String,
    /// Target hecho
    pub hecho_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_ignores_unknown_fields() {
        let page: PageResponse<HechoResumen> = serde_json::from_value(json!({
            "content": [{"id": 3, "titulo": "Incendio", "etiquetas": ["CABA"], "extra": true}],
            "number": 1,
            "totalPages": 4,
            "totalElements": 31,
            "first": false,
            "last": false,
            "pageable": {"sort": []}
        }))
        .expect("page should decode");

        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 4);
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].titulo.as_deref(), Some("Incendio"));
    }

    #[test]
    fn test_detail_accepts_both_collection_spellings() {
        let camel: HechoDetalle =
            serde_json::from_value(json!({"id": "h1", "nombreColeccion": "demo"}))
                .expect("camelCase should decode");
        let snake: HechoDetalle =
            serde_json::from_value(json!({"id": "h1", "nombre_coleccion": "demo"}))
                .expect("snake_case should decode");
        assert_eq!(camel.nombre_coleccion, Some(json!("demo")));
        assert_eq!(snake.nombre_coleccion, Some(json!("demo")));
        assert!(HechoDetalle::default().is_empty());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_id(None, "?"), "?");
        assert_eq!(display_id(Some(&json!(null)), "?"), "?");
    }

    #[test]
    fn test_new_hecho_skips_absent_fields() {
        let body = serde_json::to_value(NuevoHecho {
            nombre_coleccion: "demo".to_string(),
            titulo: "A".to_string(),
            categoria: None,
            ubicacion: Some("CABA".to_string()),
            fecha: None,
            origen: None,
        })
        .expect("serializable");
        assert_eq!(
            body,
            json!({"nombre_coleccion": "demo", "titulo": "A", "ubicacion": "CABA"})
        );
    }
}
