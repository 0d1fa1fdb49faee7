//! Authorize references and the any-of combinator.
//!
//! A route's `authorize` field names registered functions, embeds functions
//! directly, or lists several of either. Lists compile into one [`AnyOf`]:
//! every member runs concurrently against the same input and context, all
//! of them are awaited, and the request passes iff at least one allowed.
//! A member that errors denies the whole request, whatever its siblings
//! decided.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};

use crate::context::Context;
use crate::error::BoxError;
use crate::input::Input;
use crate::strategy::{Authorize, Decision};

/// One entry of a route's `authorize` field.
#[derive(Clone)]
pub enum AuthorizeRef {
    /// Looked up in the builder's authorize registry at build time.
    Named(String),
    Func(Arc<dyn Authorize>),
}

impl AuthorizeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn func(f: impl Authorize) -> Self {
        Self::Func(Arc::new(f))
    }
}

impl From<&str> for AuthorizeRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for AuthorizeRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for AuthorizeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Named({name:?})"),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Logical OR over authorize functions, evaluated concurrently, failing
/// closed. An empty combinator denies.
pub struct AnyOf {
    members: Vec<Arc<dyn Authorize>>,
}

impl AnyOf {
    pub fn new(members: Vec<Arc<dyn Authorize>>) -> Self {
        Self { members }
    }
}

impl Authorize for AnyOf {
    fn authorize(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Decision, BoxError>> {
        let calls: Vec<_> = self
            .members
            .iter()
            .map(|member| member.authorize(input.clone(), cx.clone()))
            .collect();

        Box::pin(async move {
            let mut allowed = false;
            for result in join_all(calls).await {
                if result?.is_allow() {
                    allowed = true;
                }
            }
            Ok(Decision::from(allowed))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::method::Method;

    fn fixed(decision: Decision) -> Arc<dyn Authorize> {
        Arc::new(move |_: Input, _: Context| async move { Ok::<_, BoxError>(decision) })
    }

    fn failing() -> Arc<dyn Authorize> {
        Arc::new(|_: Input, _: Context| async { Err::<Decision, BoxError>("lookup failed".into()) })
    }

    async fn decide(any: &AnyOf) -> Result<Decision, BoxError> {
        any.authorize(Input::new(), Context::new(Method::Get, "/")).await
    }

    #[tokio::test]
    async fn allows_when_any_member_allows() {
        let any = AnyOf::new(vec![fixed(Decision::Deny), fixed(Decision::Allow)]);
        assert_eq!(decide(&any).await.unwrap(), Decision::Allow);
    }

    #[tokio::test]
    async fn denies_when_every_member_denies() {
        let any = AnyOf::new(vec![fixed(Decision::Deny), fixed(Decision::Deny)]);
        assert_eq!(decide(&any).await.unwrap(), Decision::Deny);
        assert_eq!(decide(&AnyOf::new(Vec::new())).await.unwrap(), Decision::Deny);
    }

    #[tokio::test]
    async fn member_error_fails_closed() {
        let any = AnyOf::new(vec![failing(), fixed(Decision::Allow)]);
        assert!(decide(&any).await.is_err());

        let any = AnyOf::new(vec![fixed(Decision::Allow), failing()]);
        assert!(decide(&any).await.is_err());
    }

    #[tokio::test]
    async fn waits_for_every_member() {
        let finished = Arc::new(AtomicUsize::new(0));
        let slow = {
            let finished = Arc::clone(&finished);
            Arc::new(move |_: Input, _: Context| {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(Decision::Deny)
                }
            }) as Arc<dyn Authorize>
        };

        let any = AnyOf::new(vec![failing(), slow]);
        assert!(decide(&any).await.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
