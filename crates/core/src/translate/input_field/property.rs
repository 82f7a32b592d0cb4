use anyhow::Result;

use super::{write_target, InputField};
use crate::cypher::{Expr, SetItem};
use crate::err::Error;
use crate::translate::context::TranslateContext;
use crate::translate::AttachedTo;

/// Writes the value read from a sibling bound variable's same-named
/// property.
///
/// Used exclusively by the bulk create path, where the source variable is
/// the iteration binding of the surrounding `UNWIND`. Lowering one of these
/// outside that path is a structural error.
#[derive(Debug)]
pub struct PropertyInputField {
	attribute: String,
	attached_to: AttachedTo,
}

impl PropertyInputField {
	pub fn new(attribute: impl Into<String>, attached_to: AttachedTo) -> Self {
		Self {
			attribute: attribute.into(),
			attached_to,
		}
	}
}

impl InputField for PropertyInputField {
	fn attribute(&self) -> &str {
		&self.attribute
	}

	fn attached_to(&self) -> AttachedTo {
		self.attached_to
	}

	fn set_items(&self, ctx: &TranslateContext) -> Result<Vec<SetItem>> {
		let source = ctx.source().map_err(|_| Error::MissingSource)?;
		let target = write_target(ctx, self.attached_to)?;
		Ok(vec![SetItem {
			place: Expr::prop(&target, self.attribute.clone()),
			value: Expr::prop(source, self.attribute.clone()),
		}])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, OperationKind};

	#[test]
	fn requires_a_source_variable() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Create,
		});
		let field = PropertyInputField::new("title", AttachedTo::Node);
		assert!(field.set_items(&ctx).is_err());
		assert_eq!(field.set_items(&ctx.push(false)).unwrap().len(), 1);
	}
}
