use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{db::election::Amendment, mongodb::Id};

/// A request to create an election. Every field is required; they are
/// optional here so that a missing field is reported as a validation error
/// rather than a deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    /// What is being voted on.
    pub category: Option<String>,
    /// Members standing, in display order.
    #[serde(alias = "nominees")]
    pub nominee_ids: Option<Vec<Id>>,
    /// When voting closes.
    pub end_time: Option<DateTime<Utc>>,
}

/// A validated election request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSpec {
    pub category: String,
    pub nominee_ids: Vec<Id>,
    pub end_time: DateTime<Utc>,
}

impl ElectionSpec {
    /// Check every field is present and well formed. Nominee IDs are only
    /// checked for shape here; resolving them is up to the caller.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidSpec> {
        let category = validate_category(self.category)?;
        let nominee_ids = validate_nominees(self.nominee_ids)?;
        let end_time = validate_end_time(self.end_time, now)?;
        Ok(ValidSpec {
            category,
            nominee_ids,
            end_time,
        })
    }
}

/// A partial edit of an existing election. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionPatch {
    pub category: Option<String>,
    #[serde(alias = "nominees")]
    pub nominee_ids: Option<Vec<Id>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ElectionPatch {
    /// Validate whichever fields are present, producing the amendment to apply.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Amendment> {
        if self.category.is_none() && self.nominee_ids.is_none() && self.end_time.is_none() {
            return Err(Error::Validation("no changes requested".to_string()));
        }
        let category = self
            .category
            .map(|c| validate_category(Some(c)))
            .transpose()?;
        let nominees = self
            .nominee_ids
            .map(|n| validate_nominees(Some(n)))
            .transpose()?;
        let end_time = self
            .end_time
            .map(|t| validate_end_time(Some(t), now))
            .transpose()?;
        Ok(Amendment {
            category,
            nominees,
            end_time,
        })
    }
}

fn validate_category(category: Option<String>) -> Result<String> {
    match category {
        Some(category) if !category.trim().is_empty() => Ok(category.trim().to_string()),
        _ => Err(Error::Validation("category is required".to_string())),
    }
}

fn validate_nominees(nominee_ids: Option<Vec<Id>>) -> Result<Vec<Id>> {
    let nominee_ids = match nominee_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            return Err(Error::Validation(
                "at least one nominee is required".to_string(),
            ))
        }
    };
    let mut seen = HashSet::with_capacity(nominee_ids.len());
    if let Some(dup) = nominee_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::Validation(format!("nominee {dup} is listed twice")));
    }
    Ok(nominee_ids)
}

fn validate_end_time(end_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match end_time {
        None => Err(Error::Validation("end time is required".to_string())),
        Some(end_time) if end_time <= now => Err(Error::InvalidWindow),
        Some(end_time) => Ok(end_time),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn valid_spec_is_trimmed() {
        let ids = [Id::new(), Id::new()];
        let mut spec = ElectionSpec::example(&ids);
        spec.category = Some("  Choir Director ".to_string());
        let valid = spec.validate(Utc::now()).unwrap();
        assert_eq!(valid.category, "Choir Director");
        assert_eq!(valid.nominee_ids, ids.to_vec());
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        let now = Utc::now();
        let ids = [Id::new()];

        let mut spec = ElectionSpec::example(&ids);
        spec.category = Some("   ".to_string());
        assert!(matches!(spec.validate(now), Err(Error::Validation(_))));

        let mut spec = ElectionSpec::example(&ids);
        spec.nominee_ids = Some(Vec::new());
        assert!(matches!(spec.validate(now), Err(Error::Validation(_))));

        let mut spec = ElectionSpec::example(&ids);
        spec.end_time = None;
        assert!(matches!(spec.validate(now), Err(Error::Validation(_))));
    }

    #[test]
    fn duplicate_nominees_are_rejected() {
        let id = Id::new();
        let spec = ElectionSpec::example(&[id, Id::new(), id]);
        assert!(matches!(spec.validate(Utc::now()), Err(Error::Validation(_))));
    }

    #[test]
    fn end_time_must_be_in_the_future() {
        let now = Utc::now();
        let mut spec = ElectionSpec::example(&[Id::new()]);
        spec.end_time = Some(now);
        assert!(matches!(spec.validate(now), Err(Error::InvalidWindow)));

        let patch = ElectionPatch {
            end_time: Some(now - Duration::minutes(1)),
            ..Default::default()
        };
        assert!(matches!(patch.validate(now), Err(Error::InvalidWindow)));
    }

    #[test]
    fn patch_carries_only_present_fields() {
        let patch = ElectionPatch {
            category: Some("Welfare".to_string()),
            ..Default::default()
        };
        let amendment = patch.validate(Utc::now()).unwrap();
        assert_eq!(amendment.category.as_deref(), Some("Welfare"));
        assert!(amendment.nominees.is_none());
        assert!(amendment.end_time.is_none());

        assert!(matches!(
            ElectionPatch::default().validate(Utc::now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn deserialises_from_camel_case() {
        let id = Id::new();
        let json = format!(
            r#"{{"category":"Welfare","nomineeIds":["{id}"],"endTime":"2030-01-01T00:00:00Z"}}"#
        );
        let spec: ElectionSpec = rocket::serde::json::serde_json::from_str(&json).unwrap();
        assert_eq!(spec.nominee_ids, Some(vec![id]));
        assert_eq!(spec.category.as_deref(), Some("Welfare"));
    }
}
