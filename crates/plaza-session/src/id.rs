//! Session id generation.

use plaza_protocol::SessionId;
use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of a generated session id, in characters.
pub const SESSION_ID_LEN: usize = 16;

/// Generates a fresh random session id: 16 characters from `[A-Za-z0-9]`.
///
/// That is about 95 bits of entropy, so two live sessions colliding is not
/// a practical concern. Ids are listed to other clients in `space-joined`,
/// so they must not be derived from anything secret.
pub fn generate_session_id() -> SessionId {
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect();
    SessionId::new(id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_session_id_unique() {
        let ids: HashSet<_> = (0..1_000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }
}
