//! # Task Graph
//!
//! A small fan-out primitive for apply cycles: independent tasks run
//! concurrently, and a task may be declared to start only after another one
//! succeeded. [`TaskGraph::run`] waits for every started task before
//! returning, even after a failure, and reports the first failure in
//! completion order.
//!
//! ## Semantics
//!
//! - Root tasks ([`TaskGraph::spawn`]) start as soon as `run` is called.
//! - Dependent tasks ([`TaskGraph::spawn_after`]) start when their parent
//!   returned `Ok`. When the parent fails or panics, the dependent (and its
//!   own dependents) never start.
//! - A panicking task is reported as [`TaskFailure::Panicked`] instead of
//!   unwinding into the caller.
//! - Dropping the future returned by [`TaskGraph::run`] aborts every task
//!   still running; nothing outlives the run.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle, JoinSet};

type TaskFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'static>>;

/// Handle to a task of a [`TaskGraph`], used to declare dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(usize);

/// Why a task graph run failed.
#[derive(Debug)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    Failed {
        /// Task name.
        task: String,
        /// The task's error.
        error: E,
    },
    /// The task panicked.
    Panicked {
        /// Task name.
        task: String,
    },
}

impl<E> TaskFailure<E> {
    /// Name of the task that failed.
    pub fn task(&self) -> &str {
        match self {
            Self::Failed { task, .. } | Self::Panicked { task } => task,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TaskFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { task, error } => write!(f, "{task}: {error}"),
            Self::Panicked { task } => write!(f, "{task}: task panicked"),
        }
    }
}

impl<E: Error + 'static> Error for TaskFailure<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Panicked { .. } => None,
        }
    }
}

struct Node<E> {
    name: String,
    parent: Option<usize>,
    future: Option<TaskFuture<E>>,
}

/// A set of tasks with optional "start after" edges.
pub struct TaskGraph<E> {
    nodes: Vec<Node<E>>,
}

impl<E: Send + 'static> TaskGraph<E> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a task that starts immediately when the graph runs.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> TaskId
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.push(name.into(), None, Box::pin(future))
    }

    /// Add a task that starts once `parent` has succeeded.
    ///
    /// `parent` must come from this graph; an id from another graph whose
    /// index does not exist here makes the task a root.
    pub fn spawn_after<F>(&mut self, parent: TaskId, name: impl Into<String>, future: F) -> TaskId
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let parent = (parent.0 < self.nodes.len()).then_some(parent.0);
        self.push(name.into(), parent, Box::pin(future))
    }

    /// Number of declared tasks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no task was declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, name: String, parent: Option<usize>, future: TaskFuture<E>) -> TaskId {
        self.nodes.push(Node {
            name,
            parent,
            future: Some(future),
        });
        TaskId(self.nodes.len() - 1)
    }

    /// Run every task, honoring dependencies, and wait for all started tasks.
    ///
    /// Must be called within a tokio runtime.
    pub async fn run(mut self) -> Result<(), TaskFailure<E>> {
        let mut running = JoinSet::new();
        let mut first_failure = None;

        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent.is_none())
            .collect();
        for id in roots {
            self.start(id, &mut running);
        }

        while let Some(joined) = running.join_next().await {
            // Wrappers never panic: the task itself runs in its own spawned
            // task and its panic surfaces as a JoinError below.
            let Ok((id, outcome)) = joined else {
                continue;
            };
            let name = self.nodes[id].name.clone();
            let failure = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(task = %name, "task succeeded");
                    let dependents: Vec<usize> = (0..self.nodes.len())
                        .filter(|&i| self.nodes[i].parent == Some(id))
                        .collect();
                    for dep in dependents {
                        self.start(dep, &mut running);
                    }
                    continue;
                }
                Ok(Err(error)) => TaskFailure::Failed { task: name, error },
                Err(_) => TaskFailure::Panicked { task: name },
            };
            tracing::debug!(task = %failure.task(), "task failed");
            self.skip_dependents(id);
            if first_failure.is_none() {
                first_failure = Some(failure);
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn start(&mut self, id: usize, running: &mut JoinSet<(usize, TaskOutcome<E>)>) {
        let Some(future) = self.nodes[id].future.take() else {
            return;
        };
        tracing::debug!(task = %self.nodes[id].name, "starting task");
        let handle = AbortOnDrop(tokio::spawn(future));
        running.spawn(async move { (id, handle.await) });
    }

    fn skip_dependents(&mut self, id: usize) {
        let mut stack = vec![id];
        while let Some(parent) = stack.pop() {
            for i in 0..self.nodes.len() {
                if self.nodes[i].parent == Some(parent) && self.nodes[i].future.take().is_some() {
                    tracing::debug!(
                        task = %self.nodes[i].name,
                        parent = %self.nodes[parent].name,
                        "skipping task: dependency did not succeed"
                    );
                    stack.push(i);
                }
            }
        }
    }
}

type TaskOutcome<E> = Result<Result<(), E>, JoinError>;

/// Join handle that aborts its task when dropped. The `JoinSet` aborts the
/// wrappers when a run is dropped, and this carries the abort on to the
/// spawned task itself.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<E: Send + 'static> Default for TaskGraph<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for TaskGraph<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field(
                "tasks",
                &self.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
