//! Runtime decoration: an engine wrapped by an ordered chain of interceptors.
//!
//! A [`DecoratedRuntime`] presents the same [`ScriptRuntime`] surface as the
//! engine it wraps. Each evaluation walks the chain front to back; an
//! interceptor either handles the call itself or passes it on with
//! [`Next::run`], possibly with different bytes. The end of the chain is the
//! engine's own `evaluate_javascript`.
//!
//! ```text
//! evaluate ─► interceptor[0] ─► interceptor[1] ─► ... ─► engine
//! ```

use std::fmt;
use std::sync::Arc;

use crate::engine::{Buffer, ScriptEngine, ScriptRuntime};

/// Intercepts script evaluation on its way to the engine.
pub trait Interceptor<E: ScriptEngine>: Send + Sync {
	fn evaluate_javascript(
		&self,
		source: Buffer,
		source_url: &str,
		next: Next<'_, E>,
	) -> Result<E::Value, E::Error>;
}

impl<E: ScriptEngine, T: Interceptor<E> + ?Sized> Interceptor<E> for Arc<T> {
	fn evaluate_javascript(
		&self,
		source: Buffer,
		source_url: &str,
		next: Next<'_, E>,
	) -> Result<E::Value, E::Error> {
		(**self).evaluate_javascript(source, source_url, next)
	}
}

/// The remainder of the chain after the current interceptor.
pub struct Next<'a, E: ScriptEngine> {
	engine: &'a E,
	rest: &'a [Box<dyn Interceptor<E>>],
}

impl<E: ScriptEngine> Clone for Next<'_, E> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<E: ScriptEngine> Copy for Next<'_, E> {}

impl<'a, E: ScriptEngine> Next<'a, E> {
	/// The wrapped engine, for calls other than plain evaluation.
	pub fn engine(&self) -> &'a E {
		self.engine
	}

	/// Hands the evaluation to the next interceptor, or to the engine at the end.
	pub fn run(self, source: Buffer, source_url: &str) -> Result<E::Value, E::Error> {
		match self.rest.split_first() {
			Some((head, rest)) => head.evaluate_javascript(
				source,
				source_url,
				Next {
					engine: self.engine,
					rest,
				},
			),
			None => self.engine.evaluate_javascript(source, source_url),
		}
	}
}

/// An engine plus the interceptors every evaluation passes through.
pub struct DecoratedRuntime<E: ScriptEngine> {
	engine: Arc<E>,
	interceptors: Vec<Box<dyn Interceptor<E>>>,
}

impl<E: ScriptEngine> DecoratedRuntime<E> {
	/// The wrapped engine; everything except evaluation goes straight to it.
	pub fn engine(&self) -> &Arc<E> {
		&self.engine
	}

	pub fn interceptor_count(&self) -> usize {
		self.interceptors.len()
	}
}

impl<E: ScriptEngine> ScriptRuntime for DecoratedRuntime<E> {
	type Value = E::Value;
	type Error = E::Error;

	fn evaluate_javascript(&self, source: Buffer, source_url: &str) -> Result<E::Value, E::Error> {
		Next {
			engine: &*self.engine,
			rest: &self.interceptors,
		}
		.run(source, source_url)
	}
}

impl<E: ScriptEngine> fmt::Debug for DecoratedRuntime<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DecoratedRuntime")
			.field("interceptors", &self.interceptors.len())
			.finish_non_exhaustive()
	}
}

/// Composes a [`DecoratedRuntime`]. Interceptors added first run first.
pub struct RuntimeBuilder<E: ScriptEngine> {
	engine: Arc<E>,
	interceptors: Vec<Box<dyn Interceptor<E>>>,
}

impl<E: ScriptEngine> RuntimeBuilder<E> {
	pub fn new(engine: E) -> Self {
		Self::from_arc(Arc::new(engine))
	}

	/// Wraps an engine that is also shared elsewhere.
	pub fn from_arc(engine: Arc<E>) -> Self {
		Self {
			engine,
			interceptors: Vec::new(),
		}
	}

	pub fn engine(&self) -> &Arc<E> {
		&self.engine
	}

	pub fn with(mut self, interceptor: impl Interceptor<E> + 'static) -> Self {
		self.interceptors.push(Box::new(interceptor));
		self
	}

	pub fn build(self) -> DecoratedRuntime<E> {
		DecoratedRuntime {
			engine: self.engine,
			interceptors: self.interceptors,
		}
	}
}
