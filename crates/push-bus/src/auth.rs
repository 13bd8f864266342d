use async_trait::async_trait;

/// Authorization collaborator for connection lifecycle. Session issuance
/// and validation themselves are out of scope (spec: external collaborator
/// named "Session" in the interface list); this trait is the seam a real
/// session service implements.
#[async_trait]
pub trait SessionAuthorizer: Send + Sync {
    /// Returns `true` if `session_id` identifies a connection that may join
    /// `group`.
    async fn authorize(&self, session_id: &str, group_is_privileged: bool) -> bool;
}

/// Authorizer that accepts every session; useful for local testing only.
pub struct AllowAll;

#[async_trait]
impl SessionAuthorizer for AllowAll {
    async fn authorize(&self, _session_id: &str, _group_is_privileged: bool) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_authorizes_everything() {
        let auth = AllowAll;
        assert!(auth.authorize("anything", true).await);
    }
}
