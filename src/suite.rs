//! Suites of checks, collections of suites, and the invoker that runs them
//!
//! A [`Suite`] is an ordered set of check functions over one source type. A
//! [`Collection`] is the whole run for one file classification: suites that
//! are ready to go plus [`Parser`]s that first need to read more bytes. The
//! invoker runs everything concurrently and isolates failures: a check that
//! errors or panics becomes a `fail` check, and a parser that errors becomes a
//! single synthetic `fail` check in its place.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, join_all};
use tracing::warn;

use crate::check::{Check, Status};
use crate::error::Result;

/// A rule evaluated against a source of type `S`
#[async_trait]
pub trait CheckFunction<S>: Send + Sync
where
    S: Send + Sync + 'static,
{
    async fn evaluate(&self, source: Arc<S>) -> Result<Status>;
}

/// A synchronous rule
pub struct SyncCheck<F>(pub F);

#[async_trait]
impl<S, F> CheckFunction<S> for SyncCheck<F>
where
    S: Send + Sync + 'static,
    F: Fn(&S) -> Result<Status> + Send + Sync,
{
    async fn evaluate(&self, source: Arc<S>) -> Result<Status> {
        (self.0)(&source)
    }
}

/// A rule that needs to await something, usually more bytes
pub struct AsyncCheck<F>(pub F);

#[async_trait]
impl<S, F> CheckFunction<S> for AsyncCheck<F>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>) -> BoxFuture<'static, Result<Status>> + Send + Sync,
{
    async fn evaluate(&self, source: Arc<S>) -> Result<Status> {
        (self.0)(source).await
    }
}

/// Ordered mapping from check id to rule. Ids are unique; inserting an id
/// that already exists replaces the rule in place.
pub struct Suite<S: Send + Sync + 'static> {
    entries: Vec<(String, Box<dyn CheckFunction<S>>)>,
}

impl<S: Send + Sync + 'static> Default for Suite<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S: Send + Sync + 'static> Suite<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, check: Box<dyn CheckFunction<S>>) {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = check,
            None => self.entries.push((id, check)),
        }
    }

    /// Add an infallible synchronous rule
    pub fn check<F>(mut self, id: &str, check: F) -> Self
    where
        F: Fn(&S) -> Status + Send + Sync + 'static,
    {
        self.insert(id, Box::new(SyncCheck(move |source: &S| Ok(check(source)))));
        self
    }

    /// Add a synchronous rule that may fail to evaluate
    pub fn try_check<F>(mut self, id: &str, check: F) -> Self
    where
        F: Fn(&S) -> Result<Status> + Send + Sync + 'static,
    {
        self.insert(id, Box::new(SyncCheck(check)));
        self
    }

    pub fn check_async<F>(mut self, id: &str, check: F) -> Self
    where
        F: Fn(Arc<S>) -> BoxFuture<'static, Result<Status>> + Send + Sync + 'static,
    {
        self.insert(id, Box::new(AsyncCheck(check)));
        self
    }

    /// Append `other`; on id collisions its rules win
    pub fn merge(mut self, other: Suite<S>) -> Self {
        for (id, check) in other.entries {
            self.insert(id, check);
        }
        self
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn with_source(self, source: S) -> SuiteWithSource<S> {
        SuiteWithSource {
            source: Arc::new(source),
            suite: self,
        }
    }
}

/// A suite bound to the value it inspects
pub struct SuiteWithSource<S: Send + Sync + 'static> {
    pub source: Arc<S>,
    pub suite: Suite<S>,
}

impl<S: Send + Sync + 'static> SuiteWithSource<S> {
    /// Run every rule. Output order is suite order; errors and panics become
    /// `fail` checks and never stop the other rules.
    pub async fn invoke(&self) -> Vec<Check> {
        let evaluations = self.suite.entries.iter().map(|(id, check)| {
            let source = Arc::clone(&self.source);
            async move {
                match AssertUnwindSafe(check.evaluate(source)).catch_unwind().await {
                    Ok(Ok(status)) => Check::new(id.as_str(), status),
                    Ok(Err(error)) => Check::fail(id.as_str(), error.to_string()),
                    Err(panic) => Check::fail(id.as_str(), panic_message(panic.as_ref())),
                }
            }
        });
        join_all(evaluations).await
    }
}

/// Type-erased suite, so collections can mix source types
pub trait Runnable: Send {
    fn run(self: Box<Self>) -> BoxFuture<'static, Vec<Check>>;
}

impl<S: Send + Sync + 'static> Runnable for SuiteWithSource<S> {
    fn run(self: Box<Self>) -> BoxFuture<'static, Vec<Check>> {
        async move { self.invoke().await }.boxed()
    }
}

/// Reads what a suite needs, then hands the bound suite back
pub type Parser = BoxFuture<'static, Result<Box<dyn Runnable>>>;

pub enum CollectionEntry {
    Suite(Box<dyn Runnable>),
    Parser(Parser),
}

/// Everything to run for one file classification, in report order
#[derive(Default)]
pub struct Collection {
    entries: Vec<CollectionEntry>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suite<S: Send + Sync + 'static>(mut self, suite: SuiteWithSource<S>) -> Self {
        self.entries.push(CollectionEntry::Suite(Box::new(suite)));
        self
    }

    pub fn parser(mut self, parser: Parser) -> Self {
        self.entries.push(CollectionEntry::Parser(parser));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lift an async constructor of a bound suite into a [`Parser`]
pub fn parser<S, Fut>(future: Fut) -> Parser
where
    S: Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<SuiteWithSource<S>>> + Send + 'static,
{
    async move {
        let suite = future.await?;
        Ok(Box::new(suite) as Box<dyn Runnable>)
    }
    .boxed()
}

/// Run every entry of a collection concurrently and flatten the results,
/// preserving collection order and then suite order.
pub async fn invoke_collection(collection: Collection) -> Vec<Check> {
    let runs = collection
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| async move {
            let runnable = match entry {
                CollectionEntry::Suite(runnable) => runnable,
                CollectionEntry::Parser(parser) => {
                    match AssertUnwindSafe(parser).catch_unwind().await {
                        Ok(Ok(runnable)) => runnable,
                        Ok(Err(error)) => {
                            warn!("Parser {} failed: {}", index, error);
                            return vec![parser_failure(index, error.to_string())];
                        }
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            warn!("Parser {} panicked: {}", index, message);
                            return vec![parser_failure(index, message)];
                        }
                    }
                }
            };

            match AssertUnwindSafe(runnable.run()).catch_unwind().await {
                Ok(checks) => checks,
                Err(panic) => vec![parser_failure(index, panic_message(panic.as_ref()))],
            }
        });

    join_all(runs).await.into_iter().flatten().collect()
}

fn parser_failure(index: usize, info: String) -> Check {
    Check::fail(format!("parser {}: failed to read source", index), info)
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "check panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckStatus;
    use crate::error::ValidationError;

    fn numbers() -> Suite<u32> {
        Suite::<u32>::new()
            .check("even", |n| Status::from(n % 2 == 0))
            .check("small", |n| Status::from(*n < 100))
            .try_check("parsed", |_| Err(ValidationError::Check("boom".to_string())))
    }

    #[tokio::test]
    async fn test_invoke_preserves_order_and_isolates_errors() {
        let checks = numbers().with_source(42).invoke().await;
        let ids: Vec<&str> = checks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["even", "small", "parsed"]);
        assert_eq!(checks[0].status, CheckStatus::Pass);
        assert_eq!(checks[1].status, CheckStatus::Pass);
        assert_eq!(checks[2].status, CheckStatus::Fail);
        assert!(checks[2].info.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_one_throwing_check_among_ten() {
        let mut suite = Suite::<u32>::new();
        for i in 0..10 {
            let id = format!("check{}", i);
            suite = if i == 4 {
                suite.check(&id, |_| panic!("rule exploded"))
            } else {
                suite.check(&id, |_| Status::pass())
            };
        }

        let checks = suite.with_source(0).invoke().await;
        assert_eq!(checks.len(), 10);
        let failed: Vec<_> = checks.iter().filter(|c| c.status == CheckStatus::Fail).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "check4");
        assert_eq!(failed[0].info.as_deref(), Some("rule exploded"));
    }

    #[tokio::test]
    async fn test_async_check() {
        let suite = Suite::<u32>::new().check_async("later", |n| {
            async move {
                tokio::task::yield_now().await;
                Ok(Status::from(*n == 7))
            }
            .boxed()
        });
        let checks = suite.with_source(7).invoke().await;
        assert_eq!(checks[0].status, CheckStatus::Pass);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let overrides = Suite::<u32>::new()
            .check("even", |_| Status::warn("odd"))
            .check("last", |_| Status::pass());
        let suite = numbers().merge(overrides);
        assert_eq!(suite.ids(), vec!["even", "small", "parsed", "last"]);
    }

    #[tokio::test]
    async fn test_invoke_collection_with_failing_parser() {
        let collection = Collection::new()
            .suite(Suite::<u32>::new().check("first", |_| Status::pass()).with_source(1))
            .parser(parser(async {
                Err::<SuiteWithSource<u32>, _>(ValidationError::Check("no bytes".to_string()))
            }))
            .parser(parser(async {
                tokio::task::yield_now().await;
                Ok(Suite::<String>::new()
                    .check("third", |s| Status::from(s == "ok"))
                    .with_source("ok".to_string()))
            }));

        let checks = invoke_collection(collection).await;
        let ids: Vec<&str> = checks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "parser 1: failed to read source", "third"]);
        assert_eq!(checks[1].status, CheckStatus::Fail);
        assert!(checks[1].info.as_deref().unwrap().contains("no bytes"));
        assert_eq!(checks[2].status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_invoke_collection_is_idempotent() {
        let build = || Collection::new().suite(numbers().with_source(3));
        let first = invoke_collection(build()).await;
        let second = invoke_collection(build()).await;
        assert_eq!(first, second);
    }
}
