use serde::{Deserialize, Deserializer};

use crate::error::CoreError;

/// Server-assigned job identifier. Always carried as a string.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Maximum length of a job id.
const MAX_JOB_ID_LEN: usize = 128;

/// Validate a job id before it is placed into a URL path.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_JOB_ID_LEN` characters.
/// - Must contain only ASCII alphanumeric, hyphen, underscore, or dot characters.
pub fn validate_job_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::Validation(
            "Job id must not be empty".to_string(),
        ));
    }
    if id.len() > MAX_JOB_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Job id must not exceed {MAX_JOB_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "Job id may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    Ok(())
}

/// Accept either a JSON string or a JSON number for an id field.
///
/// Some backends serialize primary keys as integers; the client treats
/// every id as an opaque string.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Uint(n) => n.to_string(),
    })
}

/// Optional variant of [`string_or_number`].
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrap>::deserialize(deserializer)?.map(|w| w.0))
}
