//! Typed records tracked for each device flow.
//!
//! Three record kinds live in the store, each keyed by a different
//! opaque token:
//! - [`FlowRecord`] by the normalized user code
//! - [`DeviceStatus`] by the device code
//! - [`StateRecord`] by the CSRF state sent to the upstream

/// Flow data captured when a device starts a grant, keyed by the
/// normalized user code. Survives until the browser leg completes the
/// token exchange (its deletion is the commit point of that leg).
#[derive(Debug, Clone)]
pub struct FlowRecord {
    /// Device-supplied client identifier, forwarded upstream verbatim.
    pub client_id: String,
    /// Space-delimited OAuth scope list, if the device requested one.
    pub scope: Option<String>,
    /// Back-reference to the paired device code.
    pub device_code: String,
    /// PKCE verifier bound to this flow.
    pub pkce_verifier: String,
    /// Confidential-client secret. Never set by the device endpoint;
    /// carried for forward-compatibility with pre-registered flows.
    pub client_secret: Option<String>,
}

/// Polling state for a device code. Absence from the store models
/// "expired"; there is no explicit variant for it.
///
/// Both variants carry the client id asserted when the flow was
/// opened, so the token endpoint can refuse polls from any other
/// caller even after the flow record itself is gone.
#[derive(Debug, Clone)]
pub enum DeviceStatus {
    /// The user has not finished signing in yet.
    Pending {
        /// Client id the device code is bound to.
        client_id: String,
        /// Unix seconds when the flow was started.
        issued_at: u64,
    },
    /// The browser leg captured a token; held briefly for collection.
    Complete {
        /// Client id the device code is bound to.
        client_id: String,
        /// Raw upstream token response, returned to the device verbatim.
        token_response: Vec<u8>,
    },
}

impl DeviceStatus {
    /// Creates a pending status bound to `client_id`, stamped with the
    /// current time.
    #[must_use]
    pub fn pending(client_id: impl Into<String>) -> Self {
        Self::Pending {
            client_id: client_id.into(),
            issued_at: unix_timestamp(),
        }
    }

    /// Client id the device code is bound to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::Pending { client_id, .. } | Self::Complete { client_id, .. } => client_id,
        }
    }
}

/// CSRF state issued for the upstream authorization redirect, keyed by
/// the state token itself. Single use.
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// The normalized user code this state belongs to.
    pub user_code: String,
    /// Nanoseconds since the Unix epoch at issuance.
    pub issued_at_nanos: u128,
}

impl StateRecord {
    /// Creates a state record for the given flow, stamped now.
    #[must_use]
    pub fn new(user_code: impl Into<String>) -> Self {
        Self {
            user_code: user_code.into(),
            issued_at_nanos: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        }
    }
}

/// Normalizes a human-entered user code: uppercase, hyphens stripped.
#[must_use]
pub fn normalize_user_code(input: &str) -> String {
    input.replace('-', "").to_uppercase()
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_user_code() {
        assert_eq!(normalize_user_code("AB12-CD34"), "AB12CD34");
        assert_eq!(normalize_user_code("ab12cd34"), "AB12CD34");
        assert_eq!(normalize_user_code("Ab12-cD34"), "AB12CD34");
        assert_eq!(normalize_user_code("AB12CD34"), "AB12CD34");
    }

    #[test]
    fn test_normalize_preserves_distinct_codes() {
        assert_ne!(normalize_user_code("AB12-CD34"), normalize_user_code("AB12-CD35"));
    }

    #[test]
    fn test_pending_status_stamped() {
        match DeviceStatus::pending("cli1") {
            DeviceStatus::Pending { issued_at, .. } => assert!(issued_at > 0),
            DeviceStatus::Complete { .. } => panic!("expected pending"),
        }
    }

    #[test]
    fn test_device_status_keeps_client_binding() {
        assert_eq!(DeviceStatus::pending("cli1").client_id(), "cli1");

        let complete = DeviceStatus::Complete {
            client_id: "cli1".to_string(),
            token_response: b"{}".to_vec(),
        };
        assert_eq!(complete.client_id(), "cli1");
    }

    #[test]
    fn test_state_record_stamped() {
        let record = StateRecord::new("AB12CD34");
        assert_eq!(record.user_code, "AB12CD34");
        assert!(record.issued_at_nanos > 0);
    }
}
