use chrono::Utc;
use uuid::Uuid;

/// A disposable browser-like identity for one submission attempt.
///
/// Every field is random; two contexts never compare equal unless one is a
/// clone of the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub anonymous_id: Uuid,
    /// Key of the chat-widget session cookie, unrelated to `anonymous_id`.
    pub crisp_key: Uuid,
    pub session_token: String,
    pub client_guid: String,
    pub issued_at: i64,
}

impl SessionContext {
    pub fn build() -> Self {
        let mut client_guid = Uuid::new_v4().simple().to_string();
        client_guid.truncate(20);

        Self {
            anonymous_id: Uuid::new_v4(),
            crisp_key: Uuid::new_v4(),
            session_token: format!("session_{}", Uuid::new_v4()),
            client_guid,
            issued_at: Utc::now().timestamp(),
        }
    }

    /// Renders the context as the cookie header the upstream expects.
    pub fn cookie_header(&self) -> String {
        let ts = self.issued_at;
        format!(
            "_ga=GA1.1.{ts}.{ts}; anonymous_user_id={}; sbox-guid={}; crisp-client%2Fsession%2F{}={}",
            self.anonymous_id, self.client_guid, self.crisp_key, self.session_token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_distinct() {
        let a = SessionContext::build();
        let b = SessionContext::build();
        assert_ne!(a, b);
        assert_ne!(a.anonymous_id, b.anonymous_id);
        assert_ne!(a.session_token, b.session_token);
    }

    #[test]
    fn test_cookie_carries_identity() {
        let ctx = SessionContext::build();
        let cookie = ctx.cookie_header();
        assert!(cookie.contains(&format!("anonymous_user_id={}", ctx.anonymous_id)));
        assert!(cookie.contains(&ctx.session_token));
        assert_eq!(ctx.client_guid.len(), 20);
    }

    #[test]
    fn test_crisp_key_is_not_the_anonymous_id() {
        let ctx = SessionContext::build();
        assert_ne!(ctx.crisp_key, ctx.anonymous_id);

        let cookie = ctx.cookie_header();
        let crisp = format!("crisp-client%2Fsession%2F{}={}", ctx.crisp_key, ctx.session_token);
        assert!(cookie.contains(&crisp));
        assert_eq!(cookie.matches(&ctx.anonymous_id.to_string()).count(), 1);
    }
}
