use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Product categories a warranty can be filed under. Stored as the
/// display label in the `category` text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Electronics,
    Automotive,
    #[serde(rename = "Home & Kitchen")]
    HomeAndKitchen,
    Fashion,
    Sport,
    #[serde(rename = "Kids & Toys")]
    KidsAndToys,
    Phones,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Electronics,
        Category::Automotive,
        Category::HomeAndKitchen,
        Category::Fashion,
        Category::Sport,
        Category::KidsAndToys,
        Category::Phones,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "Electronics",
            Category::Automotive => "Automotive",
            Category::HomeAndKitchen => "Home & Kitchen",
            Category::Fashion => "Fashion",
            Category::Sport => "Sport",
            Category::KidsAndToys => "Kids & Toys",
            Category::Phones => "Phones",
        }
    }

    pub fn parse(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

/// Warranty record as stored. `days_left`/`percentage` are derived at
/// serialization time, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Warranty {
    pub id: Uuid,
    pub item_name: String,
    pub category: String,
    pub warranty_provider: Option<String>,
    pub purchased_on: Date,
    pub expires_on: Date,
    pub description: Option<String>,
    pub added_by: Uuid,
    #[serde(rename = "invoiceURL")]
    pub invoice_url: Option<String>,
    pub shared_with: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Warranty {
    /// Owner or anyone the record was shared with.
    pub fn is_visible_to(&self, user_id: Uuid, user_email: Option<&str>) -> bool {
        if self.added_by == user_id {
            return true;
        }
        match user_email {
            Some(email) => self.shared_with.iter().any(|e| e == email),
            None => false,
        }
    }
}

/// Adds `email` to the share set if absent. Returns whether the set
/// changed; re-sharing is a no-op, not an error.
pub fn grant_access(shared_with: &mut Vec<String>, email: &str) -> bool {
    if shared_with.iter().any(|e| e == email) {
        return false;
    }
    shared_with.push(email.to_string());
    true
}

/// Removes `email` from the share set if present. Revoking a non-member
/// is a no-op, not an error.
pub fn revoke_access(shared_with: &mut Vec<String>, email: &str) -> bool {
    let before = shared_with.len();
    shared_with.retain(|e| e != email);
    shared_with.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn category_labels_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("Groceries"), None);
        assert_eq!(Category::parse("electronics"), None); // labels are exact
    }

    #[test]
    fn grant_access_is_idempotent() {
        let mut shared = Vec::new();
        assert!(grant_access(&mut shared, "a@example.com"));
        assert!(!grant_access(&mut shared, "a@example.com"));
        assert_eq!(shared, vec!["a@example.com".to_string()]);
    }

    #[test]
    fn revoke_access_on_non_member_is_a_noop() {
        let mut shared = vec!["a@example.com".to_string()];
        assert!(!revoke_access(&mut shared, "ghost@example.com"));
        assert_eq!(shared, vec!["a@example.com".to_string()]);
        assert!(revoke_access(&mut shared, "a@example.com"));
        assert!(shared.is_empty());
    }

    fn sample(added_by: Uuid, shared_with: Vec<String>) -> Warranty {
        Warranty {
            id: Uuid::new_v4(),
            item_name: "Laptop".into(),
            category: "Electronics".into(),
            warranty_provider: None,
            purchased_on: date!(2025 - 01 - 01),
            expires_on: date!(2026 - 01 - 01),
            description: None,
            added_by,
            invoice_url: None,
            shared_with,
            created_at: datetime!(2025-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn visibility_owner_and_shared_only() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let w = sample(owner, vec!["friend@example.com".into()]);

        assert!(w.is_visible_to(owner, None));
        assert!(w.is_visible_to(stranger, Some("friend@example.com")));
        assert!(!w.is_visible_to(stranger, Some("other@example.com")));
        assert!(!w.is_visible_to(stranger, None));
    }

    #[test]
    fn serializes_with_camel_case_api_names() {
        let w = sample(Uuid::new_v4(), vec![]);
        let json = serde_json::to_value(&w).unwrap();
        assert!(json.get("itemName").is_some());
        assert!(json.get("sharedWith").is_some());
        assert!(json.get("item_name").is_none());
    }
}
