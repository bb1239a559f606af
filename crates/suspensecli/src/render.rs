use std::sync::Arc;

use serde::Serialize;
use suspense_resource::suspense::Failure;
use suspense_resource::{ErrorBoundary, Fetcher, Outcome, ResourceCache, ResourceKey};

use crate::user::User;

/// What ends up on screen for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum View {
    Card(Arc<User>),
    Failed {
        id: u32,
        #[serde(serialize_with = "serialize_failure")]
        error: Failure,
    },
}

fn serialize_failure<S: serde::Serializer>(failure: &Failure, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&failure.error)
}

/// Renders the user `id` through an error boundary.
///
/// `fallback` is called whenever the user is still loading. A caught failure is retried up to
/// `retries` times, calling `on_retry` with the failure and the attempt before each retry.
pub async fn render_user<F, B, R>(
    cache: &ResourceCache<F>,
    id: u32,
    key: &ResourceKey,
    retries: usize,
    mut fallback: B,
    mut on_retry: R,
) -> View
where
    F: Fetcher<Value = User>,
    B: FnMut(),
    R: FnMut(&Failure, usize),
{
    let mut boundary = ErrorBoundary::new(cache.clone());
    let mut attempt = 0;

    loop {
        match boundary.render(|cache| cache.get(key), &mut fallback).await {
            Outcome::Rendered(user) => return View::Card(user),
            Outcome::Caught(failure) if attempt < retries => {
                attempt += 1;
                tracing::info!(id, attempt, error = %failure.error, "Retrying user");
                on_retry(&failure, attempt);
                boundary.reset();
            }
            Outcome::Caught(error) => return View::Failed { id, error },
        }
    }
}
