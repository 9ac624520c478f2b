//! Business profile snapshot and the logical form-field vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical form fields a directory submission form can ask for.
///
/// Every selector hint, fallback pattern and profile value is keyed by one of
/// these names, so the resolver never deals in free-form field strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    BusinessName,
    Email,
    Phone,
    Website,
    Address,
    City,
    State,
    Zip,
    Description,
    Category,
}

impl LogicalField {
    pub const ALL: [LogicalField; 10] = [
        LogicalField::BusinessName,
        LogicalField::Email,
        LogicalField::Phone,
        LogicalField::Website,
        LogicalField::Address,
        LogicalField::City,
        LogicalField::State,
        LogicalField::Zip,
        LogicalField::Description,
        LogicalField::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::BusinessName => "business_name",
            LogicalField::Email => "email",
            LogicalField::Phone => "phone",
            LogicalField::Website => "website",
            LogicalField::Address => "address",
            LogicalField::City => "city",
            LogicalField::State => "state",
            LogicalField::Zip => "zip",
            LogicalField::Description => "description",
            LogicalField::Category => "category",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business_name" => Ok(LogicalField::BusinessName),
            "email" => Ok(LogicalField::Email),
            "phone" => Ok(LogicalField::Phone),
            "website" => Ok(LogicalField::Website),
            "address" => Ok(LogicalField::Address),
            "city" => Ok(LogicalField::City),
            "state" => Ok(LogicalField::State),
            "zip" => Ok(LogicalField::Zip),
            "description" => Ok(LogicalField::Description),
            "category" => Ok(LogicalField::Category),
            other => Err(format!("unknown logical field: {}", other)),
        }
    }
}

/// Snapshot of the customer's business data used to fill submission forms.
///
/// Supplied inline by the orchestrator in the `next` response; the worker
/// never fetches customer data itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub business_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl BusinessProfile {
    /// Value to write into a form control for a logical field, if the
    /// profile carries one.
    pub fn value_for(&self, field: LogicalField) -> Option<&str> {
        let value = match field {
            LogicalField::BusinessName => Some(self.business_name.as_str()),
            LogicalField::Address => Some(self.address.as_str()),
            LogicalField::City => Some(self.city.as_str()),
            LogicalField::State => Some(self.state.as_str()),
            LogicalField::Zip => Some(self.zip.as_str()),
            LogicalField::Phone => Some(self.phone.as_str()),
            LogicalField::Email => self.email.as_deref(),
            LogicalField::Website => self.website.as_deref(),
            LogicalField::Description => self.description.as_deref(),
            LogicalField::Category => self.category.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_field_round_trips_through_str() {
        for field in LogicalField::ALL {
            assert_eq!(field.as_str().parse::<LogicalField>().unwrap(), field);
        }
    }

    #[test]
    fn empty_profile_values_read_as_unset() {
        let profile = BusinessProfile {
            business_name: "Blue Fern Coffee".to_string(),
            phone: "(555) 010-4477".to_string(),
            ..Default::default()
        };
        assert_eq!(profile.value_for(LogicalField::BusinessName), Some("Blue Fern Coffee"));
        assert_eq!(profile.value_for(LogicalField::City), None);
        assert_eq!(profile.value_for(LogicalField::Email), None);
    }
}
