//! Shared key generation for storage backends.

use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Key for an uploaded asset that has not been claimed or paid for yet.
pub fn staging_key(staging_id: Uuid, extension: &str) -> String {
    format!("staging/{}/original.{}", staging_id, normalize_extension(extension))
}

/// Durable key for a promoted asset. Deterministic, so a repeated promotion
/// overwrites the same object instead of creating a second one.
pub fn analysis_key(account_id: Uuid, analysis_id: Uuid, extension: &str) -> String {
    format!(
        "analyses/{}/{}/logo.{}",
        account_id,
        analysis_id,
        normalize_extension(extension)
    )
}

fn normalize_extension(extension: &str) -> String {
    let ext: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            staging_key(id, ".PNG"),
            "staging/00000000-0000-0000-0000-000000000000/original.png"
        );
    }

    #[test]
    fn test_analysis_key_is_deterministic() {
        let account = Uuid::new_v4();
        let analysis = Uuid::new_v4();
        assert_eq!(
            analysis_key(account, analysis, "svg"),
            analysis_key(account, analysis, "svg")
        );
        assert!(analysis_key(account, analysis, "svg").ends_with("/logo.svg"));
    }

    #[test]
    fn test_extension_is_sanitized() {
        let key = staging_key(Uuid::nil(), "../../etc");
        assert!(validate_key(&key).is_ok());
        assert!(key.ends_with("original.etc"));
        assert!(staging_key(Uuid::nil(), "").ends_with("original.bin"));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("staging/abc/original.png").is_ok());
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
