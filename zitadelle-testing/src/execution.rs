//! Execution adapter
//!
//! Turns synchronous and asynchronous test bodies into one call that either
//! returns a value or raises a [`TestError`]. Asynchronous bodies are driven
//! on a fresh single-threaded event loop built for that one invocation.
//!
//! Panics raised by a body are caught together with the location they were
//! raised at, and never reach the previously installed panic hook.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use anyhow::Context as _;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::TestError;
use crate::metadata::ParameterSet;

/// Boxed future produced by an asynchronous test body
pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>>>>;

type SyncBody = Box<dyn Fn(&ParameterSet) -> anyhow::Result<Value>>;
type AsyncBody = Box<dyn Fn(ParameterSet) -> TestFuture>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Sync,
    Async,
}

/// A test body tagged with how it must be invoked
pub enum Handler {
    Sync(SyncBody),
    Async(AsyncBody),
}

impl Handler {
    pub fn from_sync<F, T>(body: F) -> Self
    where
        F: Fn(&ParameterSet) -> anyhow::Result<T> + 'static,
        T: Serialize,
    {
        Self::Sync(Box::new(move |params: &ParameterSet| into_value(body(params)?)))
    }

    pub fn from_async<F, Fut, T>(body: F) -> Self
    where
        F: Fn(ParameterSet) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: Serialize,
    {
        Self::Async(Box::new(move |params: ParameterSet| -> TestFuture {
            let future = body(params);
            Box::pin(async move { into_value(future.await?) })
        }))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Sync(_) => HandlerKind::Sync,
            Self::Async(_) => HandlerKind::Async,
        }
    }

    /// Run the body to completion, blocking the caller.
    ///
    /// Must not be called from inside an async runtime when the body is
    /// asynchronous; use [`Handler::invoke_async`] there.
    pub fn invoke(&self, params: &ParameterSet) -> Result<Value, TestError> {
        match self {
            Self::Sync(body) => {
                trace!("invoking synchronous body");
                settle(catch(|| body(params)))
            }
            Self::Async(body) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    return Err(TestError::Unclassified(anyhow::anyhow!(
                        "cannot block on an asynchronous test from inside a running event loop, use the async run instead"
                    )));
                }

                trace!("starting event loop for asynchronous body");
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("failed to start an event loop for the test")
                    .map_err(TestError::Unclassified)?;

                settle(runtime.block_on(CatchUnwind::new(body(params.clone()))))
            }
        }
    }

    /// Run the body on the caller's event loop
    pub async fn invoke_async(&self, params: &ParameterSet) -> Result<Value, TestError> {
        match self {
            Self::Sync(body) => settle(catch(|| body(params))),
            Self::Async(body) => settle(CatchUnwind::new(body(params.clone())).await),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

fn into_value<T: Serialize>(value: T) -> anyhow::Result<Value> {
    serde_json::to_value(value).context("test returned a value that cannot be represented")
}

/// Map a caught panic or a returned error onto the test error kinds
fn settle(outcome: Result<anyhow::Result<Value>, CaughtPanic>) -> Result<Value, TestError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TestError::classify(error)),
        Err(caught) => Err(caught.into_error()),
    }
}

/// Where a caught panic was raised
struct PanicSite {
    location: Option<String>,
    trace: Option<String>,
}

struct CaughtPanic {
    message: String,
    site: Option<PanicSite>,
}

impl CaughtPanic {
    fn into_error(self) -> TestError {
        let (location, trace) = match self.site {
            Some(site) => (site.location, site.trace),
            None => (None, None),
        };
        TestError::Assertion {
            message: self.message,
            location,
            trace,
        }
    }
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Wrap the current panic hook once per process.
///
/// While a body runs on this thread the site of a panic is recorded in
/// `LAST_PANIC`; every other panic goes to the hook that was installed before.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(Cell::get) {
                return previous(info);
            }

            let backtrace = Backtrace::capture();
            let site = PanicSite {
                location: info.location().map(ToString::to_string),
                trace: (backtrace.status() == BacktraceStatus::Captured)
                    .then(|| backtrace.to_string()),
            };
            debug!(location = ?site.location, "test body panicked");
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(site));
        }));
    });
}

/// Run `f`, catching a panic along with its site
fn catch<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_panic_hook();

    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(was_capturing));

    outcome.map_err(|payload| CaughtPanic {
        message: panic_message(payload.as_ref()),
        site: LAST_PANIC.with(|last| last.borrow_mut().take()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test body panicked".to_string()
    }
}

/// Catches panics raised while polling the wrapped future
struct CatchUnwind {
    inner: TestFuture,
}

impl CatchUnwind {
    fn new(inner: TestFuture) -> Self {
        Self { inner }
    }
}

impl Future for CatchUnwind {
    type Output = Result<anyhow::Result<Value>, CaughtPanic>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.get_mut().inner;
        match catch(|| inner.as_mut().poll(cx)) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}
