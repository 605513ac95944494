//! Business logic behind the HTTP handlers.
//!
//! Market, product and price resources all implement [`CrudService`], which
//! lets a single set of generic handlers serve every list/detail route.

pub mod markets;
pub mod prices;
pub mod products;
pub mod users;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{FieldErrors, ServiceError, FIELD_BLANK, FIELD_NULL, FIELD_REQUIRED};

pub use markets::{MarketPayload, MarketService};
pub use prices::{PricePayload, PriceRecord, PriceService};
pub use products::{ProductPayload, ProductService};
pub use users::{
    ProfilePayload, ProfileRecord, RegisterPayload, RegisteredUser, UserPayload, UserService,
};

/// Maximum length of market/product names and their optional descriptors.
pub const NAME_MAX_LENGTH: usize = 100;

/// Whether an update replaces the record (PUT) or merges into it (PATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

impl WriteMode {
    pub fn is_partial(self) -> bool {
        matches!(self, WriteMode::Partial)
    }
}

/// A resource exposed through the generic list/detail handlers.
#[async_trait]
pub trait CrudService: Send + Sync + 'static {
    /// Body accepted by create and update.
    type Payload: DeserializeOwned + Send + 'static;
    /// Representation returned to clients.
    type Record: Serialize + Send + 'static;

    /// Human name used in logs and not-found messages.
    const RESOURCE: &'static str;

    async fn list(&self) -> Result<Vec<Self::Record>, ServiceError>;

    async fn get(&self, id: i32) -> Result<Self::Record, ServiceError>;

    async fn create(&self, payload: Self::Payload) -> Result<Self::Record, ServiceError>;

    async fn update(
        &self,
        id: i32,
        payload: Self::Payload,
        mode: WriteMode,
    ) -> Result<Self::Record, ServiceError>;

    async fn delete(&self, id: i32) -> Result<(), ServiceError>;
}

pub(crate) fn not_found(resource: &str, id: i32) -> ServiceError {
    ServiceError::NotFound(format!("{} with ID {} not found", resource, id))
}

/// Distinguishes an absent key (`None`) from an explicit `null`, which
/// deserializes to `Some(..)` of the inner type.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Trims and checks a mandatory text field.
///
/// Returns the cleaned value when it was supplied and valid; records
/// "required" only for full writes.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    mode: WriteMode,
    max_length: usize,
) -> Option<String> {
    let raw = required_value(errors, field, value, mode, parse_text)?;
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        errors.add(field, FIELD_BLANK);
        None
    } else if trimmed.chars().count() > max_length {
        errors.add(field, max_length_message(max_length));
        None
    } else {
        Some(trimmed)
    }
}

/// Trims an optional, nullable text field; blank strings become `null`.
pub(crate) fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    max_length: usize,
) -> Option<Option<String>> {
    let cleaned = match value? {
        Value::Null => None,
        other => match parse_text(&other) {
            Ok(text) => Some(text.trim().to_string()).filter(|v| !v.is_empty()),
            Err(message) => {
                errors.add(field, message);
                return None;
            }
        },
    };

    match cleaned {
        Some(text) if text.chars().count() > max_length => {
            errors.add(field, max_length_message(max_length));
            None
        }
        other => Some(other),
    }
}

/// Checks presence of a mandatory field and converts it with `parse`.
///
/// Absent keys are "required" only for full writes; an explicit `null` is
/// always rejected.
pub(crate) fn required_value<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    mode: WriteMode,
    parse: impl FnOnce(&Value) -> Result<T, String>,
) -> Option<T> {
    match value {
        None => {
            if !mode.is_partial() {
                errors.add(field, FIELD_REQUIRED);
            }
            None
        }
        Some(Value::Null) => {
            errors.add(field, FIELD_NULL);
            None
        }
        Some(raw) => match parse(&raw) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                errors.add(field, message);
                None
            }
        },
    }
}

/// Strings pass through; numbers are accepted in their decimal form.
pub(crate) fn parse_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err("Not a valid string.".to_string()),
    }
}

/// Whole numbers within `i32`, given as JSON numbers or numeric strings.
pub(crate) fn parse_integer(value: &Value) -> Result<i32, String> {
    const INVALID: &str = "A valid integer is required.";

    let whole = match value {
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(n), _) => Some(n),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => Some(f as i64),
            _ => None,
        },
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| INVALID.to_string())?;

    if whole > i64::from(i32::MAX) {
        Err(format!(
            "Ensure this value is less than or equal to {}.",
            i32::MAX
        ))
    } else if whole < i64::from(i32::MIN) {
        Err(format!(
            "Ensure this value is greater than or equal to {}.",
            i32::MIN
        ))
    } else {
        Ok(whole as i32)
    }
}

/// Primary-key references: integers or numeric strings.
pub(crate) fn parse_pk(value: &Value) -> Result<i32, String> {
    let received = match value {
        Value::Bool(_) => "bool",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
        Value::String(text) if text.trim().parse::<i32>().is_err() => "str",
        _ => "",
    };
    if !received.is_empty() {
        return Err(format!(
            "Incorrect type. Expected pk value, received {}.",
            received
        ));
    }
    parse_integer(value)
        .map_err(|_| "Incorrect type. Expected pk value, received number.".to_string())
}

/// ISO `YYYY-MM-DD` calendar dates.
pub(crate) fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    value
        .as_str()
        .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| {
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
        })
}

pub(crate) fn max_length_message(max_length: usize) -> String {
    format!(
        "Ensure this field has no more than {} characters.",
        max_length
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_text_rules() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            required_text(&mut errors, "name", Some(json!("  Central ")), WriteMode::Full, 100),
            Some("Central".to_string())
        );
        assert!(errors.is_empty());

        assert_eq!(
            required_text(&mut errors, "missing", None, WriteMode::Full, 100),
            None
        );
        assert_eq!(
            required_text(&mut errors, "blank", Some(json!("   ")), WriteMode::Partial, 100),
            None
        );
        assert_eq!(
            required_text(&mut errors, "long", Some(json!("x".repeat(101))), WriteMode::Full, 100),
            None
        );
        assert_eq!(
            required_text(&mut errors, "skipped", None, WriteMode::Partial, 100),
            None
        );
        assert_eq!(
            required_text(&mut errors, "null", Some(Value::Null), WriteMode::Partial, 100),
            None
        );
        assert_eq!(
            required_text(&mut errors, "list", Some(json!(["a"])), WriteMode::Full, 100),
            None
        );

        assert_eq!(errors.get("missing"), Some(&[FIELD_REQUIRED.to_string()][..]));
        assert_eq!(errors.get("blank"), Some(&[FIELD_BLANK.to_string()][..]));
        assert_eq!(errors.get("null"), Some(&[FIELD_NULL.to_string()][..]));
        assert!(errors.get("long").is_some());
        assert!(errors.get("list").is_some());
        assert!(errors.get("skipped").is_none());
    }

    #[test]
    fn optional_text_normalizes_blank_to_null() {
        let mut errors = FieldErrors::new();
        assert_eq!(optional_text(&mut errors, "p", None, 100), None);
        assert_eq!(optional_text(&mut errors, "p", Some(Value::Null), 100), Some(None));
        assert_eq!(optional_text(&mut errors, "p", Some(json!("  ")), 100), Some(None));
        assert_eq!(
            optional_text(&mut errors, "p", Some(json!(" Bangkok ")), 100),
            Some(Some("Bangkok".to_string()))
        );
        assert!(errors.is_empty());

        assert_eq!(
            optional_text(&mut errors, "p", Some(json!("y".repeat(101))), 100),
            None
        );
        assert!(!errors.is_empty());
    }

    #[test]
    fn required_value_rejects_explicit_null_even_when_partial() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            required_value(&mut errors, "Price", Some(Value::Null), WriteMode::Partial, parse_integer),
            None
        );
        assert_eq!(errors.get("Price"), Some(&[FIELD_NULL.to_string()][..]));
    }

    #[test]
    fn parse_integer_accepts_whole_numbers_only() {
        assert_eq!(parse_integer(&json!(25)), Ok(25));
        assert_eq!(parse_integer(&json!(" 25 ")), Ok(25));
        assert_eq!(parse_integer(&json!(25.0)), Ok(25));
        assert_eq!(
            parse_integer(&json!("abc")),
            Err("A valid integer is required.".to_string())
        );
        assert!(parse_integer(&json!(2.5)).is_err());
        assert!(parse_integer(&json!(true)).is_err());
        assert!(parse_integer(&json!(3_000_000_000i64))
            .unwrap_err()
            .contains("less than or equal to"));
    }

    #[test]
    fn parse_pk_reports_the_received_type() {
        assert_eq!(parse_pk(&json!(7)), Ok(7));
        assert_eq!(parse_pk(&json!("7")), Ok(7));
        assert_eq!(
            parse_pk(&json!("rice")),
            Err("Incorrect type. Expected pk value, received str.".to_string())
        );
        assert_eq!(
            parse_pk(&json!({"id": 1})),
            Err("Incorrect type. Expected pk value, received dict.".to_string())
        );
    }

    #[test]
    fn parse_date_requires_iso_format() {
        assert_eq!(
            parse_date(&json!("2024-01-01")),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert!(parse_date(&json!("2024-13-45")).is_err());
        assert!(parse_date(&json!("01/02/2024")).is_err());
        assert!(parse_date(&json!(20240101)).is_err());
    }

    #[derive(Deserialize)]
    struct Nullable {
        #[serde(default, deserialize_with = "deserialize_some")]
        value: Option<Value>,
    }

    #[test]
    fn deserialize_some_distinguishes_null_from_absent() {
        let absent: Nullable = serde_json::from_str("{}").unwrap();
        let null: Nullable = serde_json::from_str(r#"{"value":null}"#).unwrap();
        let set: Nullable = serde_json::from_str(r#"{"value":"x"}"#).unwrap();
        assert_eq!(absent.value, None);
        assert_eq!(null.value, Some(Value::Null));
        assert_eq!(set.value, Some(json!("x")));
    }
}
