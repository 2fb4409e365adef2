// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A single-worker executor serializing access to a piece of state.
//!
//! The executor owns a state `S` on a dedicated thread. Tasks are closures over `&mut S`, queued
//! on an unbounded channel and run one at a time in submission order; an async task is awaited
//! to completion before the next one starts, so tasks never interleave. Whoever needs to know
//! when (and with what result) a task ran waits on the [`Completion`] it got back.
//!
//! The worker thread runs its own tokio runtime, so anything a task spawns (e.g. a proxy relay)
//! lives on that runtime and outlives the caller's.

use futures::future::BoxFuture;
use std::marker::PhantomData;
use tokio::sync::{mpsc, oneshot};
use tracectl::trace_target;
use tracing::{debug, error};

trace_target!("serial-executor", LevelFilter::INFO, &["concurrency"]);

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Serial executor is gone")]
    Closed,
    #[error("Failed to spawn serial executor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

trait SerialTask<S>: Send {
    fn run<'a>(self: Box<Self>, state: &'a mut S) -> BoxFuture<'a, ()>;
}

struct AsyncJob<F, T> {
    task: F,
    reply: oneshot::Sender<T>,
}

impl<S, T, F> SerialTask<S> for AsyncJob<F, T>
where
    S: Send,
    T: Send + 'static,
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send,
{
    fn run<'a>(self: Box<Self>, state: &'a mut S) -> BoxFuture<'a, ()> {
        let AsyncJob { task, reply } = *self;
        let fut = task(state);
        Box::pin(async move {
            // nobody waiting is fine
            let _ = reply.send(fut.await);
        })
    }
}

struct SyncJob<F, T> {
    task: F,
    reply: oneshot::Sender<T>,
}

impl<S, T, F> SerialTask<S> for SyncJob<F, T>
where
    S: Send,
    T: Send + 'static,
    F: FnOnce(&mut S) -> T + Send,
{
    fn run<'a>(self: Box<Self>, state: &'a mut S) -> BoxFuture<'a, ()> {
        let SyncJob { task, reply } = *self;
        let _ = reply.send(task(state));
        Box::pin(std::future::ready(()))
    }
}

type TaskBox<S> = Box<dyn SerialTask<S>>;

/// Handle on the outcome of one queued task
#[must_use = "a completion does nothing unless waited on"]
pub struct Completion<T>(oneshot::Receiver<T>);

impl<T> Completion<T> {
    /// Wait until the task has run and get its output.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::Closed`] if the executor went away before running the task.
    pub async fn wait(self) -> Result<T, ExecutorError> {
        self.0.await.map_err(|_| ExecutorError::Closed)
    }
}

/// Sender side of a serial executor. Cheap to clone; the worker stops once every clone is gone.
pub struct SerialExecutor<S> {
    tx: mpsc::UnboundedSender<TaskBox<S>>,
}

impl<S> Clone for SerialExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// A [`SerialExecutor`] reference that does not keep the worker alive
pub struct WeakSerialExecutor<S> {
    tx: mpsc::WeakUnboundedSender<TaskBox<S>>,
    _state: PhantomData<fn() -> S>,
}

impl<S> Clone for WeakSerialExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            _state: PhantomData,
        }
    }
}

impl<S> WeakSerialExecutor<S> {
    #[must_use]
    pub fn upgrade(&self) -> Option<SerialExecutor<S>> {
        self.tx.upgrade().map(|tx| SerialExecutor { tx })
    }
}

impl<S: Send + 'static> SerialExecutor<S> {
    /// Start a worker thread named `name` owning `state`.
    ///
    /// # Errors
    ///
    /// Fails if the worker thread can not be spawned.
    pub fn start(name: &str, state: S) -> Result<Self, ExecutorError> {
        let (tx, rx) = mpsc::unbounded_channel::<TaskBox<S>>();
        let thread_name = name.to_owned();
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Serial executor {thread_name}: no runtime: {e}");
                        return;
                    }
                };
                rt.block_on(Self::run(state, rx));
                debug!("Serial executor {thread_name} finished");
            })?;
        Ok(Self { tx })
    }

    async fn run(mut state: S, mut rx: mpsc::UnboundedReceiver<TaskBox<S>>) {
        while let Some(task) = rx.recv().await {
            task.run(&mut state).await;
        }
    }

    fn submit<T>(&self, job: TaskBox<S>, rx: oneshot::Receiver<T>) -> Completion<T> {
        if self.tx.send(job).is_err() {
            // the job, and its reply sender, got dropped: the completion reports Closed
            debug!("Task submitted to a stopped serial executor");
        }
        Completion(rx)
    }

    /// Queue an async task. The future it returns may borrow the state and is awaited before
    /// the next task runs.
    pub fn async_exec<T, F>(&self, task: F) -> Completion<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.submit(Box::new(AsyncJob { task, reply }), rx)
    }

    /// Queue a synchronous task.
    pub fn exec<T, F>(&self, task: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.submit(Box::new(SyncJob { task, reply }), rx)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakSerialExecutor<S> {
        WeakSerialExecutor {
            tx: self.tx.downgrade(),
            _state: PhantomData,
        }
    }
}
