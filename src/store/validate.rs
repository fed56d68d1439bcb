//! Boundary validation: every write into the store passes through here
//! before it is marshaled, regardless of backend.

use crate::error::{GatewayError, Result};

const MAX_NAME_LEN: usize = 256;
const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(GatewayError::ConfigInvalid(format!("{field} must not be empty")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(GatewayError::ConfigInvalid(format!(
            "{field} exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

pub fn validate_payload_size(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(GatewayError::ConfigInvalid(format!(
            "payload exceeds {MAX_PAYLOAD_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_rejected() {
        assert!(validate_name("name", "").is_err());
    }

    #[test]
    fn oversized_name_rejected() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_name("name", &long).is_err());
    }

    #[test]
    fn name_at_limit_accepted() {
        let at_limit = "a".repeat(MAX_NAME_LEN);
        assert!(validate_name("name", &at_limit).is_ok());
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        assert!(validate_payload_size(&payload).is_err());
    }

    #[test]
    fn payload_at_limit_accepted() {
        let payload = vec![0u8; MAX_PAYLOAD_BYTES];
        assert!(validate_payload_size(&payload).is_ok());
    }
}
