// Column layout of each role's profile table
use serde_json::{Map, Value};

use crate::{
    models::{ProfileChange, ProfileRecord, Role},
    Error, Result,
};

/// Where a role keeps its profile and what the columns are called
///
/// Renters and advertisers live in separate tables that grew different
/// column names for the photo, so every read and write goes through here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSchema {
    pub table: String,
    pub name_col: &'static str,
    pub email_col: &'static str,
    pub phone_col: &'static str,
    pub avatar_col: &'static str,
}

impl ProfileSchema {
    pub fn renter(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name_col: "name",
            email_col: "email",
            phone_col: "phone",
            avatar_col: "avatar",
        }
    }

    pub fn advertiser(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name_col: "name",
            email_col: "email",
            phone_col: "phone",
            avatar_col: "avatar_url",
        }
    }

    /// Build a record from a fetched row. Ids may come back as numbers.
    pub fn to_record(&self, row: &Value) -> Result<ProfileRecord> {
        let id = match row.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{} row has no usable id",
                    self.table
                )))
            }
        };

        let text = |col: &str| {
            row.get(col)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(ProfileRecord {
            id,
            display_name: text(self.name_col).unwrap_or_default(),
            email: text(self.email_col).unwrap_or_default(),
            phone: text(self.phone_col),
            avatar_url: text(self.avatar_col),
        })
    }

    /// Partial update body containing only the changed columns
    pub fn to_patch(&self, changes: &[ProfileChange]) -> Value {
        let mut patch = Map::new();
        for change in changes {
            match change {
                ProfileChange::DisplayName(name) => {
                    patch.insert(self.name_col.into(), Value::String(name.clone()));
                }
                ProfileChange::Phone(phone) => {
                    let value = phone.clone().map(Value::String).unwrap_or(Value::Null);
                    patch.insert(self.phone_col.into(), value);
                }
                ProfileChange::AvatarUrl(url) => {
                    patch.insert(self.avatar_col.into(), Value::String(url.clone()));
                }
            }
        }
        Value::Object(patch)
    }

    /// Full row for a new profile
    pub fn to_row(&self, profile: &ProfileRecord) -> Value {
        let mut row = Map::new();
        row.insert("id".into(), Value::String(profile.id.clone()));
        row.insert(self.name_col.into(), Value::String(profile.display_name.clone()));
        row.insert(self.email_col.into(), Value::String(profile.email.clone()));
        row.insert(
            self.phone_col.into(),
            profile.phone.clone().map(Value::String).unwrap_or(Value::Null),
        );
        if let Some(url) = &profile.avatar_url {
            row.insert(self.avatar_col.into(), Value::String(url.clone()));
        }
        Value::Object(row)
    }
}

/// One schema per role
#[derive(Debug, Clone)]
pub struct ProfileSchemas {
    renter: ProfileSchema,
    advertiser: ProfileSchema,
}

impl ProfileSchemas {
    pub fn new(renter_table: &str, advertiser_table: &str) -> Self {
        Self {
            renter: ProfileSchema::renter(renter_table),
            advertiser: ProfileSchema::advertiser(advertiser_table),
        }
    }

    pub fn for_role(&self, role: Role) -> &ProfileSchema {
        match role {
            Role::Renter => &self.renter,
            Role::Advertiser => &self.advertiser,
        }
    }
}

impl Default for ProfileSchemas {
    fn default() -> Self {
        Self::new("profiles", "advertisers")
    }
}
