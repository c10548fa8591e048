use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Coarse type family used to compare Oracle column types with Salesforce field types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeFamily {
    Text,
    Number,
    Date,
    DateTime,
    Boolean,
    Id,
    Reference,
    Picklist,
    Email,
    Phone,
    Url,
    Other,
}

impl TypeFamily {
    pub fn from_oracle(data_type: &str) -> Self {
        let upper = data_type.trim().to_ascii_uppercase();
        if upper.starts_with("TIMESTAMP") {
            return TypeFamily::DateTime;
        }
        match upper.split('(').next().unwrap_or_default() {
            "VARCHAR2" | "NVARCHAR2" | "VARCHAR" | "CHAR" | "NCHAR" | "CLOB" | "NCLOB" | "LONG" => {
                TypeFamily::Text
            }
            "NUMBER" | "FLOAT" | "INTEGER" | "BINARY_FLOAT" | "BINARY_DOUBLE" => TypeFamily::Number,
            "DATE" => TypeFamily::Date,
            _ => TypeFamily::Other,
        }
    }

    pub fn from_salesforce(field_type: &str) -> Self {
        match field_type {
            "string" | "textarea" | "encryptedstring" | "combobox" => TypeFamily::Text,
            "double" | "currency" | "int" | "long" | "percent" => TypeFamily::Number,
            "date" => TypeFamily::Date,
            "datetime" => TypeFamily::DateTime,
            "boolean" => TypeFamily::Boolean,
            "id" => TypeFamily::Id,
            "reference" => TypeFamily::Reference,
            "picklist" | "multipicklist" => TypeFamily::Picklist,
            "email" => TypeFamily::Email,
            "phone" => TypeFamily::Phone,
            "url" => TypeFamily::Url,
            _ => TypeFamily::Other,
        }
    }

    /// Families that carry free text on the Salesforce side.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            TypeFamily::Text | TypeFamily::Picklist | TypeFamily::Email | TypeFamily::Phone | TypeFamily::Url
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleColumn {
    pub table: String,
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Sample of distinct non-null values, used for pattern detection.
    #[serde(default)]
    pub samples: Vec<String>,
}

impl OracleColumn {
    pub fn family(&self) -> TypeFamily {
        TypeFamily::from_oracle(&self.data_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SfField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub length: u32,
    #[serde(default = "default_true")]
    pub nillable: bool,
    #[serde(default = "default_true")]
    pub createable: bool,
    #[serde(default = "default_true")]
    pub updateable: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub defaulted_on_create: bool,
    #[serde(default)]
    pub restricted_picklist: bool,
    #[serde(default)]
    pub picklist_values: Vec<String>,
    #[serde(default)]
    pub reference_to: Vec<String>,
}

impl SfField {
    pub fn family(&self) -> TypeFamily {
        TypeFamily::from_salesforce(&self.field_type)
    }

    /// Must be supplied on insert.
    pub fn is_required(&self) -> bool {
        self.createable && !self.nillable && !self.defaulted_on_create && self.field_type != "boolean"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SObjectSchema {
    pub name: String,
    pub label: String,
    pub fields: Vec<SfField>,
}

impl SObjectSchema {
    pub fn field(&self, name: &str) -> Option<&SfField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn createable_fields(&self) -> impl Iterator<Item = &SfField> {
        self.fields.iter().filter(|f| f.createable)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MigrationError::Mapping(format!("Failed to read schema snapshot {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Oracle table columns snapshot.
pub fn load_columns(path: &Path) -> Result<Vec<OracleColumn>> {
    let content = fs::read_to_string(path).map_err(|e| {
        MigrationError::Mapping(format!("Failed to read column snapshot {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_columns(columns: &[OracleColumn], path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(columns)?)?;
    Ok(())
}

/// `<dir>/<stem>.json`, matching the stem without regard to ASCII case so
/// `--object account` finds `Account_describe.json`.
pub fn find_snapshot(dir: &Path, stem: &str) -> Option<PathBuf> {
    let wanted = format!("{}.json", stem);
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(&wanted))
        })
}

fn default_true() -> bool {
    true
}
