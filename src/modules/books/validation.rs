//! Field rules for inbound book payloads.
//!
//! Payloads arrive as raw JSON so that every violation can be reported at
//! once, and so that an absent field can be told apart from an explicit
//! `null`.

use serde::Serialize;
use serde_json::{Map, Value};

use bookshelf_http::AppError;

use super::models::{BookPatch, NewBook};

const TITLE_MAX: usize = 200;
const AUTHOR_MAX: usize = 100;
const YEAR_MIN: i64 = 0;
const YEAR_MAX: i64 = 2100;

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    fn new(field: &str, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            error: error.into(),
            kind,
        }
    }
}

/// Every violation found in one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let details = errors
            .0
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect();
        AppError::validation(details, "Request validation failed")
    }
}

/// Validate a creation payload. All four fields are required.
pub fn validate_new(payload: &Value) -> Result<NewBook, ValidationErrors> {
    let map = as_object(payload)?;
    let mut errors = Vec::new();

    let title = required(map, "title", &mut errors).and_then(|v| collect(title(v), &mut errors));
    let author =
        required(map, "author", &mut errors).and_then(|v| collect(author(v), &mut errors));
    let year = required(map, "year", &mut errors).and_then(|v| collect(year(v), &mut errors));
    let price = required(map, "price", &mut errors).and_then(|v| collect(price(v), &mut errors));

    match (title, author, year, price) {
        (Some(title), Some(author), Some(year), Some(price)) if errors.is_empty() => Ok(NewBook {
            title,
            author,
            year,
            price,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate a partial update. Only supplied fields are checked; unknown
/// fields are ignored.
pub fn validate_patch(payload: &Value) -> Result<BookPatch, ValidationErrors> {
    let map = as_object(payload)?;
    let mut errors = Vec::new();

    let patch = BookPatch {
        title: map.get("title").and_then(|v| collect(title(v), &mut errors)),
        author: map.get("author").and_then(|v| collect(author(v), &mut errors)),
        year: map.get("year").and_then(|v| collect(year(v), &mut errors)),
        price: map.get("price").and_then(|v| collect(price(v), &mut errors)),
    };

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    payload.as_object().ok_or_else(|| {
        ValidationErrors(vec![FieldError::new(
            "body",
            "not_object",
            "Input should be a valid object",
        )])
    })
}

fn required<'a>(
    map: &'a Map<String, Value>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a Value> {
    let value = map.get(field);
    if value.is_none() {
        errors.push(FieldError::new(field, "missing", "Field required"));
    }
    value
}

fn collect<T>(result: Result<T, FieldError>, errors: &mut Vec<FieldError>) -> Option<T> {
    result.map_err(|e| errors.push(e)).ok()
}

fn title(value: &Value) -> Result<String, FieldError> {
    text("title", value, TITLE_MAX)
}

fn author(value: &Value) -> Result<String, FieldError> {
    text("author", value, AUTHOR_MAX)
}

fn text(field: &str, value: &Value, max: usize) -> Result<String, FieldError> {
    let s = match value {
        Value::Null => return Err(null(field)),
        Value::String(s) => s,
        _ => {
            return Err(FieldError::new(
                field,
                "type_error",
                "Input should be a valid string",
            ))
        }
    };

    let chars = s.chars().count();
    if chars == 0 {
        return Err(FieldError::new(
            field,
            "too_short",
            "String should have at least 1 character",
        ));
    }
    if chars > max {
        return Err(FieldError::new(
            field,
            "too_long",
            format!("String should have at most {max} characters"),
        ));
    }
    Ok(s.clone())
}

fn year(value: &Value) -> Result<i64, FieldError> {
    const FIELD: &str = "year";
    let year = match value {
        Value::Null => return Err(null(FIELD)),
        // Whole floats such as 1999.0 are accepted as integers.
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| FieldError::new(FIELD, "type_error", "Input should be a valid integer"))?;

    if year < YEAR_MIN {
        return Err(FieldError::new(
            FIELD,
            "less_than",
            format!("Input should be greater than or equal to {YEAR_MIN}"),
        ));
    }
    if year > YEAR_MAX {
        return Err(FieldError::new(
            FIELD,
            "greater_than",
            format!("Input should be less than or equal to {YEAR_MAX}"),
        ));
    }
    Ok(year)
}

fn price(value: &Value) -> Result<f64, FieldError> {
    const FIELD: &str = "price";
    let price = match value {
        Value::Null => return Err(null(FIELD)),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
    .ok_or_else(|| FieldError::new(FIELD, "type_error", "Input should be a valid number"))?;

    if price < 0.0 {
        return Err(FieldError::new(
            FIELD,
            "less_than",
            "Input should be greater than or equal to 0",
        ));
    }
    Ok(price)
}

fn null(field: &str) -> FieldError {
    FieldError::new(field, "null", "Field may not be null")
}
