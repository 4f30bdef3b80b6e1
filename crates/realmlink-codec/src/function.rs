use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::error::CallError;
use crate::value::Value;

/// Outcome of invoking a [`Callable`].
pub enum Invocation {
    /// The function is asynchronous: the result arrives through the future.
    Pending(BoxFuture<'static, Result<Value, CallError>>),
    /// The function ran to completion synchronously.
    Ready(Result<Value, CallError>),
}

/// Something that can be called with a list of arguments.
pub trait Callable: Send + Sync {
    /// Number of declared parameters.
    fn arity(&self) -> usize;

    /// Invoke with `args`.
    fn invoke(&self, args: Vec<Value>) -> Invocation;
}

struct AsyncFn<F> {
    arity: usize,
    f: F,
}

impl<F, Fut> Callable for AsyncFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Value>> + Send + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn invoke(&self, args: Vec<Value>) -> Invocation {
        let future = (self.f)(args);
        Invocation::Pending(Box::pin(async move {
            future.await.map_err(CallError::Rejected)
        }))
    }
}

struct SyncFn<F> {
    arity: usize,
    f: F,
}

impl<F> Callable for SyncFn<F>
where
    F: Fn(Vec<Value>) -> Result<Value, Value> + Send + Sync + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn invoke(&self, args: Vec<Value>) -> Invocation {
        Invocation::Ready((self.f)(args).map_err(CallError::Rejected))
    }
}

/// A function value.
///
/// Cloning shares the same function; two `Function`s are the same function
/// exactly when their [`id`](Function::id)s match.
#[derive(Clone)]
pub struct Function(Arc<dyn Callable>);

impl Function {
    /// Wrap an asynchronous function. `Err(reason)` rejects the call.
    pub fn new_async<F, Fut>(arity: usize, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Self(Arc::new(AsyncFn { arity, f }))
    }

    /// Wrap a synchronous function. `Err(reason)` is a thrown exception.
    ///
    /// Synchronous functions cannot be called from another realm.
    pub fn new_sync<F>(arity: usize, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Self(Arc::new(SyncFn { arity, f }))
    }

    pub fn from_callable(callable: Arc<dyn Callable>) -> Self {
        Self(callable)
    }

    pub fn arity(&self) -> usize {
        self.0.arity()
    }

    /// Stable identity of the underlying function.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Invoke without waiting, exposing whether the function is asynchronous.
    pub fn invoke(&self, args: Vec<Value>) -> Invocation {
        self.0.invoke(args)
    }

    /// Call the function and wait for its result.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, CallError> {
        match self.0.invoke(args) {
            Invocation::Pending(future) => future.await,
            Invocation::Ready(result) => result,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id())
            .field("arity", &self.arity())
            .finish()
    }
}
