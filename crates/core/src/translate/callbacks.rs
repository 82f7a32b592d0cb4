use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use futures::future::try_join_all;

use crate::catalog::ScalarKind;
use crate::cypher::Param;
use crate::err::Error;
use crate::val::Value;

/// The mutation kind a callback is invoked under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
	Create,
	Update,
}

impl Display for MutationKind {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			MutationKind::Create => f.write_str("CREATE"),
			MutationKind::Update => f.write_str("UPDATE"),
		}
	}
}

/// The declared type a callback result is coerced into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TypeShape {
	pub kind: ScalarKind,
	pub list: bool,
}

/// One pending computed value.
#[derive(Clone, Debug)]
pub struct CallbackEntry {
	/// The reserved placeholder the resolved value is written into.
	pub param: Param,
	/// The registered user function to invoke.
	pub function: String,
	/// The raw input object the field belongs to.
	pub parent: Value,
	/// The declared attribute type of the field.
	pub declared: TypeShape,
	/// Whether the enclosing mutation is a create or an update.
	pub kind: MutationKind,
}

/// The future returned by a user callback.
pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A user-registered computed-value function.
pub type CallbackFn = Arc<dyn Fn(Value, MutationKind) -> CallbackFuture + Send + Sync>;

/// User callbacks addressed by name.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
	callbacks: HashMap<String, CallbackFn>,
}

impl CallbackRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a callback under the given name.
	pub fn register<F, Fut>(&mut self, name: impl Into<String>, callback: F) -> &mut Self
	where
		F: Fn(Value, MutationKind) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		self.callbacks
			.insert(name.into(), Arc::new(move |parent, kind| Box::pin(callback(parent, kind))));
		self
	}

	fn get(&self, name: &str) -> Result<&CallbackFn> {
		self.callbacks.get(name).ok_or_else(|| Error::UnknownCallback(name.to_owned()).into())
	}
}

impl Debug for CallbackRegistry {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.debug_struct("CallbackRegistry").field("callbacks", &self.callbacks.keys()).finish()
	}
}

/// The per-request list of pending computed values.
///
/// The bucket is filled during the registration walk and drained exactly
/// once by [`resolve`], the single suspension point of the whole pipeline.
/// Lowering must not begin before resolution completes, because lowering
/// compiles literal parameter references that assume concrete values.
///
/// [`resolve`]: CallbackBucket::resolve
#[derive(Debug, Default)]
pub struct CallbackBucket {
	entries: Vec<CallbackEntry>,
}

impl CallbackBucket {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a pending computed value. Each placeholder is registered at
	/// most once; re-registering the same parameter is a no-op.
	pub fn add(&mut self, entry: CallbackEntry) {
		if self.entries.iter().any(|existing| existing.param == entry.param) {
			return;
		}
		self.entries.push(entry);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Resolve every registered callback and write the coerced results into
	/// their placeholders.
	///
	/// All callbacks run concurrently with no mutual ordering guarantee.
	/// Unknown function names fail before anything is invoked; a result
	/// which cannot be coerced into its declared type aborts the whole
	/// translation.
	pub async fn resolve(self, registry: &CallbackRegistry) -> Result<()> {
		let mut pending = Vec::with_capacity(self.entries.len());
		for entry in self.entries {
			let callback = registry.get(&entry.function)?.clone();
			pending.push(async move {
				trace!("resolving callback `{}` for ${}", entry.function, entry.param.name());
				let value = callback(entry.parent, entry.kind).await?;
				let value = coerce_result(value, &entry.declared, &entry.function)?;
				entry.param.set(value);
				Ok::<_, anyhow::Error>(())
			});
		}
		try_join_all(pending).await?;
		Ok(())
	}
}

/// Coerce a callback result into its declared type, recursing through list
/// types.
fn coerce_result(value: Value, declared: &TypeShape, function: &str) -> Result<Value> {
	if declared.list {
		match value {
			Value::None => Ok(Value::None),
			Value::Null => Ok(Value::Null),
			Value::Array(items) => Ok(Value::Array(
				items
					.into_iter()
					.map(|item| item.coerce_to(declared.kind))
					.collect::<Result<Vec<_>>>()?,
			)),
			_ => Err(Error::CallbackNonList {
				function: function.to_owned(),
			}
			.into()),
		}
	} else {
		value.coerce_to(declared.kind)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn entry(param: &Param, function: &str, kind: ScalarKind) -> CallbackEntry {
		CallbackEntry {
			param: param.clone(),
			function: function.to_owned(),
			parent: Value::Object(Default::default()),
			declared: TypeShape {
				kind,
				list: false,
			},
			kind: MutationKind::Create,
		}
	}

	#[tokio::test]
	async fn resolves_and_coerces_each_callback_once() {
		static CALLS: AtomicUsize = AtomicUsize::new(0);
		let mut registry = CallbackRegistry::new();
		registry.register("number", |_parent, _kind| async {
			CALLS.fetch_add(1, Ordering::SeqCst);
			Ok(Value::from(5))
		});
		registry.register("timestamp", |_parent, _kind| async {
			CALLS.fetch_add(1, Ordering::SeqCst);
			Ok(Value::from("2024-01-01T00:00:00Z"))
		});

		let p0 = Param::placeholder("param0");
		let p1 = Param::placeholder("param1");
		let mut bucket = CallbackBucket::new();
		bucket.add(entry(&p0, "number", ScalarKind::Int));
		bucket.add(entry(&p1, "timestamp", ScalarKind::Datetime));
		// Duplicate registration for the same placeholder is ignored.
		bucket.add(entry(&p0, "number", ScalarKind::Int));
		assert_eq!(bucket.len(), 2);

		bucket.resolve(&registry).await.unwrap();
		assert_eq!(CALLS.load(Ordering::SeqCst), 2);
		assert_eq!(p0.value(), Value::from(5));
		assert!(matches!(p1.value(), Value::Datetime(_)));
	}

	#[tokio::test]
	async fn non_list_result_for_list_attribute_is_rejected() {
		let mut registry = CallbackRegistry::new();
		registry.register("tags", |_parent, _kind| async { Ok(Value::from("solo")) });
		let param = Param::placeholder("param0");
		let mut bucket = CallbackBucket::new();
		bucket.add(CallbackEntry {
			param: param.clone(),
			function: "tags".into(),
			parent: Value::None,
			declared: TypeShape {
				kind: ScalarKind::String,
				list: true,
			},
			kind: MutationKind::Update,
		});
		let err = bucket.resolve(&registry).await.unwrap_err();
		assert!(matches!(
			err.downcast_ref::<Error>(),
			Some(Error::CallbackNonList { .. })
		));
	}

	#[tokio::test]
	async fn unknown_callback_fails_before_invocation() {
		let registry = CallbackRegistry::new();
		let mut bucket = CallbackBucket::new();
		bucket.add(entry(&Param::placeholder("param0"), "missing", ScalarKind::Int));
		let err = bucket.resolve(&registry).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnknownCallback(_))));
	}
}
