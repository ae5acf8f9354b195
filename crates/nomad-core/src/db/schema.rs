// Schema definition types: describes the tables the core persists and the
// unique constraints every adapter must enforce.

use serde::{Deserialize, Serialize};

/// Model (table) names as used by the adapter layer.
pub mod tables {
    pub const PLAN: &str = "plan";
    pub const PARTNER_SPACE: &str = "partnerSpace";
    pub const PRINCIPAL: &str = "principal";
    pub const TEAM: &str = "team";
    pub const INVITATION: &str = "invitation";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const CHECK_IN_TOKEN: &str = "checkInToken";
    pub const CHECK_IN: &str = "checkIn";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
}

/// A single field definition within a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Unique across records. Null values never collide.
    #[serde(default)]
    pub unique: bool,
    /// Referenced table, for backends that materialize foreign keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl SchemaField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            unique: false,
            references: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: &str) -> Self {
        self.references = Some(table.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.unique).map(|f| f.name.as_str())
    }
}

/// The full set of tables the membership core persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomadSchema {
    pub tables: Vec<TableSchema>,
}

impl NomadSchema {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl Default for NomadSchema {
    fn default() -> Self {
        use FieldType::*;
        let id = || SchemaField::new("id", String).required().unique();

        let plan = TableSchema {
            name: tables::PLAN.into(),
            fields: vec![
                id(),
                SchemaField::new("name", String).required().unique(),
                SchemaField::new("price", Number).required(),
                SchemaField::new("includedDays", Number).required(),
                SchemaField::new("unlimited", Boolean).required(),
                SchemaField::new("accessTier", String).required(),
                SchemaField::new("externalBillingCode", String),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let space = TableSchema {
            name: tables::PARTNER_SPACE.into(),
            fields: vec![
                id(),
                SchemaField::new("name", String).required().unique(),
                SchemaField::new("address", String).required(),
                SchemaField::new("accessTier", String).required(),
                SchemaField::new("amenities", Json),
                SchemaField::new("payoutPerCheckin", Number).required(),
                SchemaField::new("ownerId", String).references(tables::PRINCIPAL),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let principal = TableSchema {
            name: tables::PRINCIPAL.into(),
            fields: vec![
                id(),
                SchemaField::new("email", String).required().unique(),
                SchemaField::new("displayName", String),
                SchemaField::new("photoUrl", String),
                SchemaField::new("role", String).required(),
                SchemaField::new("managedSpaceId", String).references(tables::PARTNER_SPACE),
                SchemaField::new("teamId", String).references(tables::TEAM),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let team = TableSchema {
            name: tables::TEAM.into(),
            fields: vec![
                id(),
                SchemaField::new("name", String).required(),
                SchemaField::new("adminId", String).required().unique().references(tables::PRINCIPAL),
                SchemaField::new("seats", Number).required(),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let invitation = TableSchema {
            name: tables::INVITATION.into(),
            fields: vec![
                id(),
                SchemaField::new("teamId", String).required().references(tables::TEAM),
                SchemaField::new("email", String).required(),
                SchemaField::new("status", String).required(),
                SchemaField::new("invitedBy", String).required().references(tables::PRINCIPAL),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let subscription = TableSchema {
            name: tables::SUBSCRIPTION.into(),
            fields: vec![
                id(),
                SchemaField::new("principalId", String).references(tables::PRINCIPAL),
                SchemaField::new("teamId", String).references(tables::TEAM),
                SchemaField::new("planId", String).required().references(tables::PLAN),
                SchemaField::new("startDate", Date).required(),
                SchemaField::new("endDate", Date),
                SchemaField::new("isActive", Boolean).required(),
                SchemaField::new("paymentReference", String).unique(),
                SchemaField::new("createdAt", Date).required(),
            ],
        };
        let token = TableSchema {
            name: tables::CHECK_IN_TOKEN.into(),
            fields: vec![
                id(),
                SchemaField::new("principalId", String).required().unique().references(tables::PRINCIPAL),
                SchemaField::new("code", String).required().unique(),
                SchemaField::new("createdAt", Date).required(),
                SchemaField::new("expiresAt", Date).required(),
            ],
        };
        let check_in = TableSchema {
            name: tables::CHECK_IN.into(),
            fields: vec![
                id(),
                SchemaField::new("principalId", String).required().references(tables::PRINCIPAL),
                SchemaField::new("spaceId", String).required().references(tables::PARTNER_SPACE),
                SchemaField::new("timestamp", Date).required(),
            ],
        };

        Self {
            tables: vec![plan, space, principal, team, invitation, subscription, token, check_in],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_fields_declared() {
        let schema = NomadSchema::default();
        let unique = |t: &str| -> Vec<String> {
            schema
                .table(t)
                .unwrap()
                .unique_fields()
                .filter(|f| *f != "id")
                .map(str::to_string)
                .collect()
        };
        assert_eq!(unique(tables::PLAN), vec!["name"]);
        assert_eq!(unique(tables::PARTNER_SPACE), vec!["name"]);
        assert_eq!(unique(tables::PRINCIPAL), vec!["email"]);
        assert_eq!(unique(tables::SUBSCRIPTION), vec!["paymentReference"]);
        assert_eq!(unique(tables::CHECK_IN_TOKEN), vec!["principalId", "code"]);
        assert!(unique(tables::CHECK_IN).is_empty());
    }

    #[test]
    fn test_every_table_has_id() {
        for table in NomadSchema::default().tables {
            assert!(table.fields.iter().any(|f| f.name == "id" && f.unique), "{}", table.name);
        }
    }
}
