use sha2::{Digest, Sha256};

/// Checksummed wrapper for cached vision-analysis responses.
///
/// Analysis results are cached as JSON strings with a SHA-256 checksum
/// alongside, so a corrupted or tampered entry is detected on read and the
/// caller refetches from the vision service instead of serving bad data.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SealedEntry {
    data: String,
    checksum: String,
}

fn checksum_of(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Wraps a JSON payload with its checksum for cache storage.
pub fn seal(data: String) -> String {
    let entry = SealedEntry {
        checksum: checksum_of(&data),
        data,
    };
    serde_json::to_string(&entry).unwrap_or_default()
}

/// Unwraps a cached entry, returning the payload only if the checksum still
/// matches. `None` means the entry is unreadable or corrupted.
pub fn unseal(serialized: &str) -> Option<String> {
    let entry: SealedEntry = serde_json::from_str(serialized).ok()?;

    if checksum_of(&entry.data) == entry.checksum {
        Some(entry.data)
    } else {
        tracing::warn!(
            "Analysis cache checksum mismatch (data length {}), discarding entry",
            entry.data.len()
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_unseal_round_trip() {
        let data = r#"{"estimate": 420.0}"#.to_string();
        let sealed = seal(data.clone());
        assert_eq!(unseal(&sealed), Some(data));
    }

    #[test]
    fn test_tampered_entry_discarded() {
        let sealed = seal(r#"{"estimate": 420.0}"#.to_string());
        let tampered = sealed.replace("420", "999");
        assert_eq!(unseal(&tampered), None);
    }

    #[test]
    fn test_garbage_entry_discarded() {
        assert_eq!(unseal("not json at all"), None);
        assert_eq!(unseal(""), None);
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let a = seal("same data".to_string());
        let b = seal("same data".to_string());
        assert_eq!(a, b);
    }
}
