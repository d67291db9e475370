//! Shape enforcement and normalization of extracted document data.
//!
//! `validate` turns an untrusted JSON object (usually a model answer) into
//! typed data; `normalize` cleans typed data from either extraction path
//! and is idempotent.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::InterpretError;
use crate::heuristics::DEFAULT_UNIT;
use crate::models::{DetailItem, DocumentData, HeaderData};
use crate::normalize::{
    clean_description, coerce_string, coerce_value, finite, normalize_date, normalize_tax_id,
};

/// Reject blank input and input longer than `max_chars` characters.
pub fn validate_input(text: &str, max_chars: usize) -> Result<(), InterpretError> {
    if text.trim().is_empty() {
        return Err(InterpretError::InvalidInput("no text to interpret".to_string()));
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(InterpretError::InvalidInput(format!(
            "document too large: {} characters (limit {})",
            chars, max_chars
        )));
    }
    Ok(())
}

/// Build typed document data from a raw `{header, details}` object.
///
/// Missing header fields become empty strings; a missing `details` list
/// becomes empty. Numbers are coerced, common alternative field names
/// (`unitPrice`, `total`, `unit`, snake_case) are accepted, and items with
/// no description whose quantity, price and net value are all zero are
/// dropped. Fails when a detail entry is not an object, when `details` is
/// not a list, or when no item survives.
pub fn validate(raw: &Value) -> Result<DocumentData, InterpretError> {
    let object = raw.as_object().ok_or_else(|| {
        InterpretError::MalformedResponse("response is not a JSON object".to_string())
    })?;

    let header = validate_header(raw);

    let entries: &[Value] = match object.get("details") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => &[],
        Some(_) => {
            return Err(InterpretError::MalformedResponse(
                "details is not a list".to_string(),
            ))
        }
    };

    let mut details = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let fields = entry.as_object().ok_or_else(|| InterpretError::InvalidDetail {
            index,
            reason: "not an object".to_string(),
        })?;
        let item = detail_from(fields);
        if item.description.is_empty()
            && item.quantity == 0.0
            && item.gross_price == 0.0
            && item.net_value == 0.0
        {
            debug!("Dropping empty detail item at index {}", index);
            continue;
        }
        details.push(item);
    }

    if details.is_empty() {
        return Err(InterpretError::EmptyResult);
    }

    Ok(DocumentData { header, details })
}

/// Header fields of a raw response.
///
/// Reads the `header` object, or the top level when the model answered with
/// bare header fields. Anything missing is an empty string.
pub fn validate_header(raw: &Value) -> HeaderData {
    match raw.get("header") {
        Some(Value::Object(h)) => header_from(h),
        Some(_) => HeaderData::default(),
        None => match raw {
            Value::Object(top) if top.contains_key("name") => header_from(top),
            _ => HeaderData::default(),
        },
    }
}

fn field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|v| !v.is_null())
}

fn text(fields: &Map<String, Value>, names: &[&str]) -> String {
    field(fields, names).map(coerce_string).unwrap_or_default()
}

fn number(fields: &Map<String, Value>, names: &[&str]) -> f64 {
    field(fields, names).map(coerce_value).unwrap_or(0.0)
}

fn header_from(fields: &Map<String, Value>) -> HeaderData {
    HeaderData {
        name: text(fields, &["name", "companyName"]),
        date: text(fields, &["date"]),
        document_number: text(fields, &["documentNumber", "document_number", "number"]),
        tax_id: text(fields, &["taxId", "tax_id", "rnc"]),
    }
}

fn detail_from(fields: &Map<String, Value>) -> DetailItem {
    DetailItem {
        item_code: text(fields, &["itemCode", "item_code", "code"]),
        description: clean_description(&text(fields, &["description"])),
        unit_of_measure: text(fields, &["unitOfMeasure", "unit_of_measure", "unit"]),
        quantity: number(fields, &["quantity"]),
        gross_price: number(fields, &["grossPrice", "gross_price", "unitPrice", "price"]),
        discount: number(fields, &["discount"]),
        tax: number(fields, &["tax"]),
        net_value: number(fields, &["netValue", "net_value", "total"]),
    }
}

/// Clean document data from either extraction path.
///
/// Strings are trimmed, the tax id is reduced to upper-case alphanumerics,
/// the date is normalized where unambiguous, blank units default to `UND`,
/// blank item codes become `ITEM{n}` and every number is finite.
/// Applying it twice yields the same data.
pub fn normalize(data: DocumentData) -> DocumentData {
    let header = HeaderData {
        name: data.header.name.trim().to_string(),
        date: normalize_date(&data.header.date),
        document_number: data.header.document_number.trim().to_string(),
        tax_id: normalize_tax_id(&data.header.tax_id),
    };

    let details = data
        .details
        .into_iter()
        .enumerate()
        .map(|(index, item)| normalize_item(item, index))
        .collect();

    DocumentData { header, details }
}

fn normalize_item(item: DetailItem, index: usize) -> DetailItem {
    let item_code = match item.item_code.trim() {
        "" => format!("ITEM{}", index + 1),
        code => code.to_string(),
    };
    let unit_of_measure = match clean_description(&item.unit_of_measure).as_str() {
        "" => DEFAULT_UNIT.to_string(),
        unit => unit.to_string(),
    };

    DetailItem {
        item_code,
        description: clean_description(&item.description),
        unit_of_measure,
        quantity: finite(item.quantity),
        gross_price: finite(item.gross_price),
        discount: finite(item.discount),
        tax: finite(item.tax),
        net_value: finite(item.net_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_validate_input() {
        assert!(validate_input("hola", 10).is_ok());
        assert!(matches!(validate_input("  \n ", 10), Err(InterpretError::InvalidInput(_))));
        assert!(matches!(
            validate_input(&"x".repeat(11), 10),
            Err(InterpretError::InvalidInput(_))
        ));
        assert!(validate_input(&"ñ".repeat(10), 10).is_ok());
    }

    #[test]
    fn test_validate_maps_aliases_and_coerces() {
        let raw = json!({
            "header": {"name": " ACME ", "date": "19/11/2024", "documentNumber": 990},
            "details": [{
                "description": "ACEITE  DE OLIVA**",
                "quantity": "10",
                "unitOfMeasure": "LITROS",
                "unitPrice": "$ 5,435.00",
                "tax": 9783,
                "total": 54350.0
            }]
        });

        let data = validate(&raw).unwrap();
        assert_eq!(data.header.name, "ACME");
        assert_eq!(data.header.document_number, "990");
        assert_eq!(data.header.tax_id, "");
        assert_eq!(
            data.details,
            vec![DetailItem {
                item_code: String::new(),
                description: "ACEITE DE OLIVA*".to_string(),
                unit_of_measure: "LITROS".to_string(),
                quantity: 10.0,
                gross_price: 5435.0,
                discount: 0.0,
                tax: 9783.0,
                net_value: 54350.0,
            }]
        );
    }

    #[test]
    fn test_validate_drops_empty_items() {
        let raw = json!({
            "details": [
                {"description": "", "quantity": 0, "grossPrice": 0, "netValue": 0},
                {"description": "NADA", "quantity": 0, "grossPrice": 0, "netValue": 0},
                {"description": "SAL", "quantity": 1}
            ]
        });
        let data = validate(&raw).unwrap();
        assert_eq!(data.details.len(), 2);
        assert_eq!(data.details[0].description, "NADA");
        assert_eq!(data.details[1].description, "SAL");
        assert_eq!(data.header, HeaderData::default());
    }

    #[test]
    fn test_validate_keeps_items_without_description() {
        let raw = json!({
            "details": [{"itemCode": "A1", "quantity": 2, "grossPrice": 10, "netValue": 20}]
        });
        let data = validate(&raw).unwrap();
        assert_eq!(data.details.len(), 1);
        assert_eq!(data.details[0].item_code, "A1");
        assert_eq!(data.details[0].description, "");
        assert_eq!(data.details[0].net_value, 20.0);

        let blank = json!({"details": [{"description": "", "quantity": 0}]});
        assert!(matches!(validate(&blank), Err(InterpretError::EmptyResult)));
    }

    #[test]
    fn test_validate_errors() {
        assert!(matches!(validate(&json!([])), Err(InterpretError::MalformedResponse(_))));
        assert!(matches!(validate(&json!({})), Err(InterpretError::EmptyResult)));
        assert!(matches!(
            validate(&json!({"details": "none"})),
            Err(InterpretError::MalformedResponse(_))
        ));
        assert!(matches!(
            validate(&json!({"details": [{"description": "A", "quantity": 1}, 5]})),
            Err(InterpretError::InvalidDetail { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_header_shapes() {
        let nested = json!({"header": {"name": "ACME", "taxId": "131-1"}});
        assert_eq!(validate_header(&nested).tax_id, "131-1");

        let bare = json!({"name": "ACME", "date": "2024-11-19"});
        assert_eq!(validate_header(&bare).date, "2024-11-19");

        assert_eq!(validate_header(&json!({"header": "ACME"})), HeaderData::default());
        assert_eq!(validate_header(&json!(null)), HeaderData::default());
    }

    #[test]
    fn test_validated_numbers_are_finite() {
        let raw = json!({"details": [{"description": "X", "quantity": "9".repeat(400), "netValue": 1}]});
        let data = validate(&raw).unwrap();
        assert!(data.details.iter().all(|d| d.quantity.is_finite() && d.net_value.is_finite()));
    }

    #[test]
    fn test_normalize() {
        let data = DocumentData {
            header: HeaderData {
                name: "  ACME ".into(),
                date: "2024/11/19".into(),
                document_number: " 990 ".into(),
                tax_id: "131-12345-6".into(),
            },
            details: vec![
                DetailItem {
                    description: " SAL   FINA ".into(),
                    quantity: f64::NAN,
                    ..Default::default()
                },
                DetailItem {
                    item_code: "A-7".into(),
                    unit_of_measure: "5  LITROS".into(),
                    ..Default::default()
                },
            ],
        };

        let normalized = normalize(data);
        assert_eq!(normalized.header.name, "ACME");
        assert_eq!(normalized.header.date, "2024-11-19");
        assert_eq!(normalized.header.document_number, "990");
        assert_eq!(normalized.header.tax_id, "131123456");
        assert_eq!(normalized.details[0].item_code, "ITEM1");
        assert_eq!(normalized.details[0].description, "SAL FINA");
        assert_eq!(normalized.details[0].unit_of_measure, "UND");
        assert_eq!(normalized.details[0].quantity, 0.0);
        assert_eq!(normalized.details[1].item_code, "A-7");
        assert_eq!(normalized.details[1].unit_of_measure, "5 LITROS");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let data = DocumentData {
            header: HeaderData {
                name: " Colmado ".into(),
                date: "19 de noviembre de 2024".into(),
                document_number: "B01".into(),
                tax_id: "b-12.3".into(),
            },
            details: vec![DetailItem {
                description: "**PAN**  SOBAO".into(),
                quantity: 2.0,
                gross_price: f64::INFINITY,
                ..Default::default()
            }],
        };

        let once = normalize(data);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
