use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::warranties::lifecycle::{days_left, percentage};
use crate::warranties::model::{Category, Warranty};

/// Validated payload for creating a warranty. Built from multipart form
/// fields before any store call; validation failures never reach the
/// repo layer.
#[derive(Debug, Clone)]
pub struct NewWarranty {
    pub item_name: String,
    pub category: Category,
    pub warranty_provider: Option<String>,
    pub purchased_on: Date,
    pub expires_on: Date,
    pub description: Option<String>,
    pub added_by: Uuid,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct WarrantyPatch {
    pub item_name: Option<String>,
    pub category: Option<Category>,
    pub warranty_provider: Option<String>,
    pub purchased_on: Option<Date>,
    pub expires_on: Option<Date>,
    pub description: Option<String>,
}

fn parse_date(field: &str, value: &str) -> Result<Date, ApiError> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(value, &fmt)
        .map_err(|_| ApiError::validation(format!("{field} must be a YYYY-MM-DD date")))
}

fn required<'a>(fields: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, ApiError> {
    fields
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{key} is required")))
}

fn optional(fields: &BTreeMap<String, String>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl NewWarranty {
    pub fn from_form(fields: &BTreeMap<String, String>) -> Result<Self, ApiError> {
        let item_name = required(fields, "itemName")?.to_string();
        let category_label = required(fields, "category")?;
        let category = Category::parse(category_label)
            .ok_or_else(|| ApiError::validation(format!("unknown category: {category_label}")))?;
        let purchased_on = parse_date("purchasedOn", required(fields, "purchasedOn")?)?;
        let expires_on = parse_date("expiresOn", required(fields, "expiresOn")?)?;
        let added_by = Uuid::parse_str(required(fields, "addedBy")?)
            .map_err(|_| ApiError::validation("addedBy must be a valid id"))?;
        // expiresOn >= purchasedOn is deliberately not enforced; see DESIGN.md.
        Ok(Self {
            item_name,
            category,
            warranty_provider: optional(fields, "warrantyProvider"),
            purchased_on,
            expires_on,
            description: optional(fields, "description"),
            added_by,
        })
    }
}

impl WarrantyPatch {
    pub fn from_form(fields: &BTreeMap<String, String>) -> Result<Self, ApiError> {
        let category = match optional(fields, "category") {
            Some(label) => Some(
                Category::parse(&label)
                    .ok_or_else(|| ApiError::validation(format!("unknown category: {label}")))?,
            ),
            None => None,
        };
        let purchased_on = match optional(fields, "purchasedOn") {
            Some(v) => Some(parse_date("purchasedOn", &v)?),
            None => None,
        };
        let expires_on = match optional(fields, "expiresOn") {
            Some(v) => Some(parse_date("expiresOn", &v)?),
            None => None,
        };
        Ok(Self {
            item_name: optional(fields, "itemName"),
            category,
            warranty_provider: optional(fields, "warrantyProvider"),
            purchased_on,
            expires_on,
            description: optional(fields, "description"),
        })
    }
}

/// Body for share/revoke requests.
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub email: String,
}

/// Warranty as returned by listing endpoints: the stored record plus the
/// derived lifecycle fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyView {
    #[serde(flatten)]
    pub warranty: Warranty,
    pub days_left: i64,
    pub percentage: u8,
}

impl WarrantyView {
    pub fn annotate(warranty: Warranty, now: OffsetDateTime) -> Self {
        let days_left = days_left(warranty.expires_on, now);
        let percentage = percentage(warranty.purchased_on, warranty.expires_on, now);
        Self {
            warranty,
            days_left,
            percentage,
        }
    }
}

/// Aggregated counts for the stats endpoint.
#[derive(Debug, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub expiring_soon: i64,
    pub by_category: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete_form() -> BTreeMap<String, String> {
        form(&[
            ("itemName", "Laptop"),
            ("category", "Electronics"),
            ("purchasedOn", "2025-01-01"),
            ("expiresOn", "2026-01-01"),
            ("addedBy", "0d2f3a5e-1b4c-4d6e-8f90-123456789abc"),
            ("warrantyProvider", "Apple Inc."),
        ])
    }

    #[test]
    fn new_warranty_parses_complete_form() {
        let w = NewWarranty::from_form(&complete_form()).unwrap();
        assert_eq!(w.item_name, "Laptop");
        assert_eq!(w.category, Category::Electronics);
        assert_eq!(w.purchased_on, date!(2025 - 01 - 01));
        assert_eq!(w.expires_on, date!(2026 - 01 - 01));
        assert_eq!(w.warranty_provider.as_deref(), Some("Apple Inc."));
        assert!(w.description.is_none());
    }

    #[test]
    fn missing_item_name_is_a_validation_error() {
        let mut fields = complete_form();
        fields.remove("itemName");
        let err = NewWarranty::from_form(&fields).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("itemName"));
    }

    #[test]
    fn blank_item_name_is_a_validation_error() {
        let mut fields = complete_form();
        fields.insert("itemName".into(), "   ".into());
        assert!(matches!(
            NewWarranty::from_form(&fields),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut fields = complete_form();
        fields.insert("category".into(), "Groceries".into());
        assert!(matches!(
            NewWarranty::from_form(&fields),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn malformed_owner_id_is_rejected() {
        let mut fields = complete_form();
        fields.insert("addedBy".into(), "not-a-uuid".into());
        assert!(matches!(
            NewWarranty::from_form(&fields),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn inverted_interval_is_accepted_as_is() {
        // expiresOn before purchasedOn is stored unchanged; the lifecycle
        // calculator treats it as fully elapsed.
        let mut fields = complete_form();
        fields.insert("purchasedOn".into(), "2026-01-01".into());
        fields.insert("expiresOn".into(), "2025-01-01".into());
        assert!(NewWarranty::from_form(&fields).is_ok());
    }

    #[test]
    fn patch_keeps_unset_fields_as_none() {
        let patch = WarrantyPatch::from_form(&form(&[("itemName", "New name")])).unwrap();
        assert_eq!(patch.item_name.as_deref(), Some("New name"));
        assert!(patch.category.is_none());
        assert!(patch.expires_on.is_none());
    }

    #[test]
    fn view_carries_derived_fields() {
        let warranty = Warranty {
            id: Uuid::new_v4(),
            item_name: "Laptop".into(),
            category: "Electronics".into(),
            warranty_provider: None,
            purchased_on: date!(2025 - 01 - 01),
            expires_on: date!(2025 - 12 - 31),
            description: None,
            added_by: Uuid::new_v4(),
            invoice_url: None,
            shared_with: vec![],
            created_at: datetime!(2025-01-01 00:00:00 UTC),
        };
        let view = WarrantyView::annotate(warranty, datetime!(2025-07-02 00:00:00 UTC));
        assert_eq!(view.percentage, 50);
        assert!(view.days_left > 0);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("daysLeft").is_some());
        assert!(json.get("percentage").is_some());
        assert!(json.get("itemName").is_some());
    }
}
