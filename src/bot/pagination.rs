//! Pagination state carried in inline-button callback data.
//!
//! Wire format: `KIND|keyword|filterOrSentinel|page`. This module is the only
//! place that knows the delimiter, the sentinel and the length limit.

use super::event::{ControlButton, PaginationControls};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field separator inside callback data
pub const DELIMITER: char = '|';
/// Stands for "no filter"; never a legal filter value
pub const ABSENT_FILTER: &str = "_";
/// Telegram rejects callback data longer than this
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;
/// Room kept for the page index when checking the length limit
const PAGE_DIGITS_RESERVED: usize = 5;

const FIELD_COUNT: usize = 4;

/// Label of the "previous page" button
pub const PREVIOUS_LABEL: &str = "◀ Anterior";
/// Label of the "next page" button
pub const NEXT_LABEL: &str = "▶ Siguiente";

/// Which paginated command a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationKind {
    /// Keyword search (`/buscar`)
    Buscar,
}

impl PaginationKind {
    /// Discriminator written as the token's first field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buscar => "BUSCAR",
        }
    }

    /// Case-insensitive discriminator test used by handler predicates
    #[must_use]
    pub fn matches(self, discriminator: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(discriminator)
    }
}

impl fmt::Display for PaginationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaginationKind {
    type Err = MalformedTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::Buscar.matches(s) {
            Ok(Self::Buscar)
        } else {
            Err(MalformedTokenError::UnknownKind(s.to_string()))
        }
    }
}

/// Rejected at construction: the token could not be encoded faithfully
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidTokenField {
    /// A field contains the delimiter
    #[error("'{0}' no puede contener el carácter '|'")]
    ContainsDelimiter(String),
    /// The filter collides with the absent-filter sentinel
    #[error("el tag '_' está reservado")]
    ReservedFilter,
    /// Encoded form would not fit in callback data
    #[error("la búsqueda es demasiado larga ({0} bytes)")]
    TooLong(usize),
}

/// A callback token that does not decode to a [`PaginationToken`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedTokenError {
    /// Wrong number of `|`-separated fields
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    /// First field names no known command
    #[error("unknown token kind '{0}'")]
    UnknownKind(String),
    /// Page index is not a non-negative integer
    #[error("invalid page index '{0}'")]
    InvalidPage(String),
}

/// Everything needed to re-run a paginated query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaginationToken {
    kind: PaginationKind,
    keyword: String,
    filter: Option<String>,
    page: u32,
}

impl PaginationToken {
    /// Validate and build a token.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTokenField`] when a field contains the delimiter, the
    /// filter equals the sentinel, or the encoding would not fit in callback
    /// data.
    pub fn new(
        kind: PaginationKind,
        keyword: impl Into<String>,
        filter: Option<String>,
        page: u32,
    ) -> Result<Self, InvalidTokenField> {
        let keyword = keyword.into();
        if keyword.contains(DELIMITER) {
            return Err(InvalidTokenField::ContainsDelimiter(keyword));
        }
        if let Some(tag) = &filter {
            if tag.contains(DELIMITER) {
                return Err(InvalidTokenField::ContainsDelimiter(tag.clone()));
            }
            if tag == ABSENT_FILTER {
                return Err(InvalidTokenField::ReservedFilter);
            }
        }

        let token = Self {
            kind,
            keyword,
            filter,
            page,
        };
        let fixed = token.kind.as_str().len()
            + token.keyword.len()
            + token.filter_field().len()
            + (FIELD_COUNT - 1);
        let worst_case = fixed + PAGE_DIGITS_RESERVED.max(digits(page));
        if worst_case > MAX_CALLBACK_DATA_BYTES {
            return Err(InvalidTokenField::TooLong(worst_case));
        }
        Ok(token)
    }

    /// Command the token belongs to
    #[must_use]
    pub const fn kind(&self) -> PaginationKind {
        self.kind
    }

    /// Search keyword
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Optional tag filter
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Zero-based page index
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Same query, another page
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    fn filter_field(&self) -> &str {
        self.filter.as_deref().unwrap_or(ABSENT_FILTER)
    }

    /// Serialize to callback data
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{kind}{d}{keyword}{d}{filter}{d}{page}",
            kind = self.kind,
            keyword = self.keyword,
            filter = self.filter_field(),
            page = self.page,
            d = DELIMITER,
        )
    }

    /// Parse callback data produced by [`PaginationToken::encode`]
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTokenError`] on a wrong field count, an unknown
    /// kind or a non-integer page.
    pub fn decode(raw: &str) -> Result<Self, MalformedTokenError> {
        let fields: Vec<&str> = raw.split(DELIMITER).collect();
        let [kind, keyword, filter, page] = fields.as_slice() else {
            return Err(MalformedTokenError::FieldCount(fields.len()));
        };

        let kind = kind.parse::<PaginationKind>()?;
        let page = page
            .parse::<u32>()
            .map_err(|_| MalformedTokenError::InvalidPage((*page).to_string()))?;
        let filter = (*filter != ABSENT_FILTER).then(|| (*filter).to_string());

        Ok(Self {
            kind,
            keyword: (*keyword).to_string(),
            filter,
            page,
        })
    }

    /// Previous/next buttons for a results page.
    ///
    /// "Previous" appears when `current > 0`, "next" when more pages follow.
    /// A button whose callback data would exceed
    /// [`MAX_CALLBACK_DATA_BYTES`] is left out.
    #[must_use]
    pub fn controls(&self, current: u32, total_pages: u32) -> PaginationControls {
        let previous = current.checked_sub(1);
        let next = current
            .checked_add(1)
            .filter(|page| *page < total_pages);

        let buttons = [(previous, PREVIOUS_LABEL), (next, NEXT_LABEL)]
            .into_iter()
            .filter_map(|(page, label)| {
                let data = self.with_page(page?).encode();
                (data.len() <= MAX_CALLBACK_DATA_BYTES).then(|| ControlButton {
                    label: label.to_string(),
                    data,
                })
            })
            .collect();
        PaginationControls { buttons }
    }
}

const fn digits(mut n: u32) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(keyword: &str, filter: Option<&str>, page: u32) -> PaginationToken {
        PaginationToken::new(
            PaginationKind::Buscar,
            keyword,
            filter.map(str::to_string),
            page,
        )
        .expect("valid token")
    }

    #[test]
    fn test_encode_format() {
        assert_eq!(token("incendio", None, 0).encode(), "BUSCAR|incendio|_|0");
        assert_eq!(
            token("incendio", Some("CABA"), 3).encode(),
            "BUSCAR|incendio|CABA|3"
        );
    }

    #[test]
    fn test_sentinel_decodes_to_none() {
        let decoded = PaginationToken::decode("BUSCAR|lluvia|_|1").expect("decodes");
        assert_eq!(decoded.filter(), None);
        assert_eq!(decoded.page(), 1);

        let empty_tag = PaginationToken::decode("BUSCAR|lluvia||1").expect("decodes");
        assert_eq!(empty_tag.filter(), Some(""));
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let decoded = PaginationToken::decode("buscar|x|_|0").expect("decodes");
        assert_eq!(decoded.kind(), PaginationKind::Buscar);
        assert_eq!(decoded.encode(), "BUSCAR|x|_|0");
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(
            PaginationToken::decode("BUSCAR|x|_"),
            Err(MalformedTokenError::FieldCount(3))
        );
        assert_eq!(
            PaginationToken::decode("BUSCAR|a|b|c|1"),
            Err(MalformedTokenError::FieldCount(5))
        );
        assert_eq!(
            PaginationToken::decode("BUSCAR|x|_|-1"),
            Err(MalformedTokenError::InvalidPage("-1".to_string()))
        );
        assert_eq!(
            PaginationToken::decode("BUSCAR|x|_|uno"),
            Err(MalformedTokenError::InvalidPage("uno".to_string()))
        );
        assert!(matches!(
            PaginationToken::decode("OTRO|x|_|0"),
            Err(MalformedTokenError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        assert!(matches!(
            PaginationToken::new(PaginationKind::Buscar, "a|b", None, 0),
            Err(InvalidTokenField::ContainsDelimiter(_))
        ));
        assert_eq!(
            PaginationToken::new(PaginationKind::Buscar, "a", Some("_".to_string()), 0),
            Err(InvalidTokenField::ReservedFilter)
        );
        assert!(matches!(
            PaginationToken::new(PaginationKind::Buscar, "x".repeat(60), None, 0),
            Err(InvalidTokenField::TooLong(_))
        ));
    }

    #[test]
    fn test_controls() {
        let t = token("kw", None, 0);

        let first = t.controls(0, 3);
        assert_eq!(first.data().collect::<Vec<_>>(), vec!["BUSCAR|kw|_|1"]);
        assert_eq!(first.buttons[0].label, NEXT_LABEL);

        let middle = t.controls(1, 3);
        assert_eq!(
            middle.data().collect::<Vec<_>>(),
            vec!["BUSCAR|kw|_|0", "BUSCAR|kw|_|2"]
        );

        let last = t.controls(2, 3);
        assert_eq!(last.data().collect::<Vec<_>>(), vec!["BUSCAR|kw|_|1"]);

        assert!(t.controls(0, 1).is_empty());
        assert!(t.controls(0, 0).is_empty());
    }

    #[test]
    fn test_controls_never_exceed_callback_limit() {
        // 59 fixed bytes plus five page digits is exactly the limit
        let t = token(&"k".repeat(49), None, 0);
        assert_eq!(t.with_page(99_999).encode().len(), MAX_CALLBACK_DATA_BYTES);

        let controls = t.controls(99_999, 200_000);
        assert_eq!(
            controls.data().collect::<Vec<_>>(),
            vec![t.with_page(99_998).encode()]
        );
        assert!(controls.data().all(|d| d.len() <= MAX_CALLBACK_DATA_BYTES));
        assert!(t.controls(u32::MAX, u32::MAX).data().all(|d| d.len() <= MAX_CALLBACK_DATA_BYTES));
    }

    #[test]
    fn test_digits() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(u32::MAX), 10);
    }
}
