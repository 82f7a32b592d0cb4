use std::sync::RwLock;

use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::input_field::{compile_input_fields, register_field_callbacks, InputField};
use super::operation::{MutationOperation, Operation, Transpiled};
use crate::cypher::{Clause, CreateClause, Expr, NodePattern, Param, Pattern, UnwindClause};
use crate::err::Error;

/// The bulk create path: one `UNWIND` over a single list parameter instead
/// of one create subtree per input item.
///
/// All iterated items share the same pattern, write and guard structure, so
/// the clause tree stays O(1) in the input size. Eligibility of the input
/// shape for this path is certified outside this module; once chosen, every
/// input-field variant and authorization path of the item-by-item create is
/// still supported. Per-item values are read off the iteration binding
/// through property input fields.
#[derive(Debug)]
pub struct UnwindCreateOperation {
	entity: String,
	labels: Vec<String>,
	param: Param,
	input_fields: Vec<Box<dyn InputField>>,
	authorization: AuthorizationFilters,
	scoped_ctx: RwLock<Option<TranslateContext>>,
}

impl UnwindCreateOperation {
	pub fn new(entity: impl Into<String>, labels: Vec<String>, param: Param) -> Self {
		Self {
			entity: entity.into(),
			labels,
			param,
			input_fields: Vec::new(),
			authorization: AuthorizationFilters::new(),
			scoped_ctx: RwLock::new(None),
		}
	}

	pub fn with_input_fields(mut self, fields: Vec<Box<dyn InputField>>) -> Self {
		self.input_fields = fields;
		self
	}

	pub fn with_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.authorization = authorization;
		self
	}

	fn scoped(&self) -> Result<TranslateContext> {
		self.scoped_ctx
			.read()
			.expect("scoped context poisoned")
			.clone()
			.ok_or_else(|| Error::MissingNestedContext.into())
	}
}

impl Operation for UnwindCreateOperation {
	fn name(&self) -> &'static str {
		"UnwindCreateOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		register_field_callbacks(&self.input_fields, bucket);
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let item = ctx.fresh_var("item");
		// The iteration binding becomes the source the per-item property
		// writes read from.
		let scoped = ctx.rebind(item.clone()).push(false);
		*self.scoped_ctx.write().expect("scoped context poisoned") = Some(scoped.clone());

		let mut clauses = vec![
			Clause::Unwind(UnwindClause {
				list: Expr::param(&self.param),
				alias: item,
			}),
			Clause::Create(CreateClause {
				pattern: Pattern::Node(NodePattern::new(
					scoped.target().clone(),
					self.labels.clone(),
				)),
			}),
		];
		clauses.extend(compile_input_fields(&self.input_fields, &scoped)?);

		Ok(Transpiled::new(clauses, Expr::Var(scoped.target().clone())))
	}
}

impl MutationOperation for UnwindCreateOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		match when {
			AuthTiming::Before => Ok(Vec::new()),
			AuthTiming::After => {
				let scoped = self.scoped()?;
				self.authorization.validation_clauses(&scoped, AuthTiming::After)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{AttachedTo, Env, OperationKind, PropertyInputField};
	use crate::val::Value;

	#[test]
	fn bulk_create_shares_one_unwind() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Create,
		});
		let items = Value::Array(vec![
			Value::Object([("title".to_owned(), Value::from("A"))].into()),
			Value::Object([("title".to_owned(), Value::from("B"))].into()),
		]);
		let op = UnwindCreateOperation::new(
			"Movie",
			vec!["Movie".into()],
			Param::new("param0", items),
		)
		.with_input_fields(vec![Box::new(PropertyInputField::new("title", AttachedTo::Node))]);
		let transpiled = op.transpile(&ctx).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		assert_eq!(text.matches("UNWIND").count(), 1, "{text}");
		assert_eq!(text.matches("CREATE").count(), 1, "{text}");
		// The write reads off the iteration binding, not a per-item param.
		assert!(text.contains(".title = item"), "{text}");
	}
}
