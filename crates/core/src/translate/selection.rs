use anyhow::Result;

use super::context::TranslateContext;
use crate::catalog::{Cardinality, Direction, Relationship};
use crate::cypher::{NodePattern, PathPattern, Pattern, RelPattern};

/// Describes how an operation reaches its target entity.
///
/// Applying a selection yields the match pattern together with a context
/// scoped to the variables the pattern binds. This is the only place a
/// lowering pass derives new scopes from.
#[derive(Clone, Debug)]
pub enum SelectionPattern {
	Node(NodeSelection),
	Relationship(RelationshipSelection),
}

/// Selects target nodes directly by label.
#[derive(Clone, Debug)]
pub struct NodeSelection {
	pub labels: Vec<String>,
}

impl NodeSelection {
	pub fn new(labels: Vec<String>) -> Self {
		Self {
			labels,
		}
	}
}

/// Selects target nodes through a typed, directed relationship from the
/// current target.
#[derive(Clone, Debug)]
pub struct RelationshipSelection {
	pub rel_type: String,
	pub direction: Direction,
	pub target_labels: Vec<String>,
	pub cardinality: Cardinality,
}

impl RelationshipSelection {
	pub fn new(relationship: &Relationship, target_labels: Vec<String>) -> Self {
		Self {
			rel_type: relationship.rel_type.clone(),
			direction: relationship.direction,
			target_labels,
			cardinality: relationship.cardinality,
		}
	}
}

impl SelectionPattern {
	/// Whether this selection traverses a relationship.
	pub fn is_relationship(&self) -> bool {
		matches!(self, SelectionPattern::Relationship(_))
	}

	/// The relationship cardinality, for relationship selections.
	pub fn cardinality(&self) -> Option<Cardinality> {
		match self {
			SelectionPattern::Node(_) => None,
			SelectionPattern::Relationship(rel) => Some(rel.cardinality),
		}
	}

	/// Derive the match pattern and the scoped context of this selection.
	pub fn apply(&self, ctx: &TranslateContext) -> Result<(Pattern, TranslateContext)> {
		match self {
			SelectionPattern::Node(node) => {
				let scoped = ctx.push(false);
				let pattern = Pattern::Node(NodePattern::new(
					scoped.target().clone(),
					node.labels.clone(),
				));
				Ok((pattern, scoped))
			}
			SelectionPattern::Relationship(rel) => {
				let scoped = ctx.push(true);
				let pattern = Pattern::Path(PathPattern::new(
					NodePattern::bare(ctx.target().clone()),
					RelPattern::new(
						Some(scoped.relationship()?.clone()),
						rel.rel_type.clone(),
						rel.direction,
					),
					NodePattern::new(scoped.target().clone(), rel.target_labels.clone()),
				));
				Ok((pattern, scoped))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, OperationKind};

	#[test]
	fn relationship_selection_scopes_new_variables() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Read,
		});
		let selection = SelectionPattern::Relationship(RelationshipSelection {
			rel_type: "ACTED_IN".into(),
			direction: Direction::In,
			target_labels: vec!["Actor".into()],
			cardinality: Cardinality::Many,
		});
		let (pattern, scoped) = selection.apply(&ctx).unwrap();
		assert_eq!(scoped.source().unwrap(), ctx.target());
		let rendered = pattern.to_string();
		assert!(rendered.starts_with(&format!("({})<-[", ctx.target())), "{rendered}");
		assert!(rendered.contains(":ACTED_IN]"), "{rendered}");
	}
}
