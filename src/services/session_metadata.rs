use sha2::{Digest, Sha256};

const MAX_USER_AGENT_LEN: usize = 512;

/// Client details captured once, when an attempt is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SessionMetadata {
    pub(crate) ip_address: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) fingerprint_hash: Option<String>,
}

impl SessionMetadata {
    pub(crate) fn capture(
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        client_fingerprint: Option<&str>,
    ) -> Self {
        Self {
            ip_address: non_empty(ip_address).map(str::to_string),
            user_agent: non_empty(user_agent).map(truncate_user_agent),
            fingerprint_hash: non_empty(client_fingerprint).map(hash_fingerprint),
        }
    }
}

pub(crate) fn hash_fingerprint(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn truncate_user_agent(value: &str) -> String {
    value.chars().take(MAX_USER_AGENT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hashed_never_stored_raw() {
        let metadata = SessionMetadata::capture(Some("10.0.0.7"), Some("Firefox"), Some("abc"));
        assert_eq!(metadata.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(
            metadata.fingerprint_hash.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn blank_values_are_dropped() {
        let metadata = SessionMetadata::capture(Some(" "), None, Some(""));
        assert_eq!(metadata, SessionMetadata::default());
    }

    #[test]
    fn long_user_agents_are_truncated() {
        let agent = "x".repeat(2000);
        let metadata = SessionMetadata::capture(None, Some(&agent), None);
        assert_eq!(metadata.user_agent.map(|value| value.len()), Some(MAX_USER_AGENT_LEN));
    }
}
