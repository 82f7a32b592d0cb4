use std::fmt::{self, Display, Formatter, Write};

use super::expr::Expr;
use super::param::Var;
use super::pattern::Pattern;
use super::VisitParams;
use crate::fmt::Fmt;

/// A `WHERE` predicate attached to a match or with clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Cond(pub Expr);

impl Display for Cond {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "WHERE {}", self.0)
	}
}

impl VisitParams for Cond {
	fn visit_params<F: FnMut(&super::Param)>(&self, visitor: &mut F) {
		self.0.visit_params(visitor);
	}
}

/// One fragment of the compiled query program.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Clause {
	Match(MatchClause),
	Create(CreateClause),
	Merge(MergeClause),
	Delete(DeleteClause),
	Set(SetClause),
	With(WithClause),
	Unwind(UnwindClause),
	Call(CallClause),
	Union(UnionClause),
	Return(ReturnClause),
	Validate(ValidateClause),
}

/// `MATCH` / `OPTIONAL MATCH` with an optional predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchClause {
	pub pattern: Pattern,
	pub optional: bool,
	pub cond: Option<Cond>,
}

impl MatchClause {
	pub fn new(pattern: Pattern) -> Self {
		Self {
			pattern,
			optional: false,
			cond: None,
		}
	}

	pub fn optional(pattern: Pattern) -> Self {
		Self {
			pattern,
			optional: true,
			cond: None,
		}
	}

	pub fn with_cond(mut self, cond: Option<Expr>) -> Self {
		self.cond = cond.map(Cond);
		self
	}
}

impl Display for MatchClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		if self.optional {
			f.write_str("OPTIONAL ")?;
		}
		write!(f, "MATCH {}", self.pattern)?;
		if let Some(ref cond) = self.cond {
			write!(f, "\n{cond}")?;
		}
		Ok(())
	}
}

/// `CREATE` of a node or path pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateClause {
	pub pattern: Pattern,
}

impl Display for CreateClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "CREATE {}", self.pattern)
	}
}

/// `MERGE` of a path pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeClause {
	pub pattern: Pattern,
}

impl Display for MergeClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "MERGE {}", self.pattern)
	}
}

/// `DELETE` / `DETACH DELETE` of bound variables.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteClause {
	pub vars: Vec<Var>,
	pub detach: bool,
}

impl Display for DeleteClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		if self.detach {
			f.write_str("DETACH ")?;
		}
		write!(f, "DELETE {}", Fmt::comma_separated(self.vars.iter()))
	}
}

/// One assignment inside a `SET` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct SetItem {
	pub place: Expr,
	pub value: Expr,
}

impl Display for SetItem {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{} = {}", self.place, self.value)
	}
}

/// `SET` with one or more assignments.
#[derive(Clone, Debug, PartialEq)]
pub struct SetClause {
	pub items: Vec<SetItem>,
}

impl Display for SetClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "SET {}", Fmt::comma_separated(self.items.iter()))
	}
}

/// One projected item of a `WITH` or `RETURN` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
	pub expr: Expr,
	pub alias: Option<Var>,
}

impl Projection {
	pub fn new(expr: Expr) -> Self {
		Self {
			expr,
			alias: None,
		}
	}

	pub fn aliased(expr: Expr, alias: Var) -> Self {
		Self {
			expr,
			alias: Some(alias),
		}
	}
}

impl Display for Projection {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		Display::fmt(&self.expr, f)?;
		if let Some(ref alias) = self.alias {
			write!(f, " AS {alias}")?;
		}
		Ok(())
	}
}

/// Sort direction for one ordering field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
	#[default]
	Ascending,
	Descending,
}

/// `ORDER BY` over one or more expressions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderBy {
	pub fields: Vec<(Expr, OrderDirection)>,
}

impl Display for OrderBy {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(
			f,
			"ORDER BY {}",
			Fmt::comma_separated(self.fields.iter().map(|(expr, direction)| Fmt::new(
				(expr, direction),
				|(expr, direction), f| {
					Display::fmt(expr, f)?;
					if matches!(direction, OrderDirection::Descending) {
						f.write_str(" DESC")?;
					}
					Ok(())
				}
			)))
		)
	}
}

/// `WITH` carrying projections, an optional predicate, ordering and paging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WithClause {
	pub items: Vec<Projection>,
	pub distinct: bool,
	pub cond: Option<Cond>,
	pub order: Option<OrderBy>,
	pub skip: Option<Expr>,
	pub limit: Option<Expr>,
}

impl WithClause {
	pub fn new(items: Vec<Projection>) -> Self {
		Self {
			items,
			..Default::default()
		}
	}

	/// Carry the given variables through unchanged.
	pub fn vars(vars: impl IntoIterator<Item = Var>) -> Self {
		Self::new(vars.into_iter().map(|v| Projection::new(Expr::Var(v))).collect())
	}
}

impl Display for WithClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("WITH ")?;
		if self.distinct {
			f.write_str("DISTINCT ")?;
		}
		write!(f, "{}", Fmt::comma_separated(self.items.iter()))?;
		if let Some(ref cond) = self.cond {
			write!(f, "\n{cond}")?;
		}
		if let Some(ref order) = self.order {
			write!(f, "\n{order}")?;
		}
		if let Some(ref skip) = self.skip {
			write!(f, "\nSKIP {skip}")?;
		}
		if let Some(ref limit) = self.limit {
			write!(f, "\nLIMIT {limit}")?;
		}
		Ok(())
	}
}

/// `UNWIND` of a list expression into a fresh binding.
#[derive(Clone, Debug, PartialEq)]
pub struct UnwindClause {
	pub list: Expr,
	pub alias: Var,
}

impl Display for UnwindClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "UNWIND {} AS {}", self.list, self.alias)
	}
}

/// A `CALL { ... }` subquery importing outer variables.
#[derive(Clone, Debug, PartialEq)]
pub struct CallClause {
	pub imports: Vec<Var>,
	pub body: Vec<Clause>,
}

impl CallClause {
	pub fn new(imports: Vec<Var>, body: Vec<Clause>) -> Self {
		Self {
			imports,
			body,
		}
	}
}

impl Display for CallClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("CALL {")?;
		if !self.imports.is_empty() {
			write!(f, "\n\tWITH {}", Fmt::comma_separated(self.imports.iter()))?;
		}
		for clause in &self.body {
			write_indented(f, clause)?;
		}
		f.write_str("\n}")
	}
}

/// A `CALL { ... UNION ... }` subquery combining branch results.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionClause {
	pub imports: Vec<Var>,
	pub branches: Vec<Vec<Clause>>,
}

impl Display for UnionClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("CALL {")?;
		for (i, branch) in self.branches.iter().enumerate() {
			if i > 0 {
				f.write_str("\n\tUNION")?;
			}
			if !self.imports.is_empty() {
				write!(f, "\n\tWITH {}", Fmt::comma_separated(self.imports.iter()))?;
			}
			for clause in branch {
				write_indented(f, clause)?;
			}
		}
		f.write_str("\n}")
	}
}

/// `RETURN` with one or more projections.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnClause {
	pub items: Vec<Projection>,
	pub distinct: bool,
}

impl ReturnClause {
	pub fn new(items: Vec<Projection>) -> Self {
		Self {
			items,
			distinct: false,
		}
	}
}

impl Display for ReturnClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("RETURN ")?;
		if self.distinct {
			f.write_str("DISTINCT ")?;
		}
		write!(f, "{}", Fmt::comma_separated(self.items.iter()))
	}
}

/// A runtime assertion embedded in the program.
///
/// The asserted predicate must hold for every row reaching this clause; a
/// violation at execution time fails the whole enclosing atomic statement.
/// The engine's transaction semantics are relied upon to undo writes already
/// performed earlier in the same statement.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidateClause {
	pub assert: Expr,
	pub message: String,
}

impl ValidateClause {
	pub fn new(assert: Expr, message: impl Into<String>) -> Self {
		Self {
			assert,
			message: message.into(),
		}
	}
}

impl Display for ValidateClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(
			f,
			"CALL apoc.util.validate(NOT ({}), '{}', [0])",
			self.assert,
			self.message.replace('\'', "\\'")
		)
	}
}

/// Writes a clause into a subquery body, indenting every line by one tab.
fn write_indented(f: &mut Formatter, clause: &Clause) -> fmt::Result {
	let text = clause.to_string();
	for line in text.lines() {
		f.write_char('\n')?;
		f.write_char('\t')?;
		f.write_str(line)?;
	}
	Ok(())
}

impl Display for Clause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Clause::Match(c) => Display::fmt(c, f),
			Clause::Create(c) => Display::fmt(c, f),
			Clause::Merge(c) => Display::fmt(c, f),
			Clause::Delete(c) => Display::fmt(c, f),
			Clause::Set(c) => Display::fmt(c, f),
			Clause::With(c) => Display::fmt(c, f),
			Clause::Unwind(c) => Display::fmt(c, f),
			Clause::Call(c) => Display::fmt(c, f),
			Clause::Union(c) => Display::fmt(c, f),
			Clause::Return(c) => Display::fmt(c, f),
			Clause::Validate(c) => Display::fmt(c, f),
		}
	}
}

impl VisitParams for Clause {
	fn visit_params<F: FnMut(&super::Param)>(&self, visitor: &mut F) {
		match self {
			Clause::Match(c) => {
				c.pattern.visit_params(visitor);
				c.cond.visit_params(visitor);
			}
			Clause::Create(c) => c.pattern.visit_params(visitor),
			Clause::Merge(c) => c.pattern.visit_params(visitor),
			Clause::Delete(_) => {}
			Clause::Set(c) => {
				for item in &c.items {
					item.place.visit_params(visitor);
					item.value.visit_params(visitor);
				}
			}
			Clause::With(c) => {
				for item in &c.items {
					item.expr.visit_params(visitor);
				}
				c.cond.visit_params(visitor);
				if let Some(ref order) = c.order {
					for (expr, _) in &order.fields {
						expr.visit_params(visitor);
					}
				}
				c.skip.visit_params(visitor);
				c.limit.visit_params(visitor);
			}
			Clause::Unwind(c) => c.list.visit_params(visitor),
			Clause::Call(c) => c.body.visit_params(visitor),
			Clause::Union(c) => {
				for branch in &c.branches {
					branch.visit_params(visitor);
				}
			}
			Clause::Return(c) => {
				for item in &c.items {
					item.expr.visit_params(visitor);
				}
			}
			Clause::Validate(c) => c.assert.visit_params(visitor),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cypher::{NodePattern, Param};
	use crate::val::Value;

	#[test]
	fn renders_call_subquery() {
		let this = Var::new("this0");
		let call = CallClause::new(
			vec![this.clone()],
			vec![
				Clause::Match(MatchClause::new(Pattern::Node(NodePattern::new(
					Var::new("this1"),
					vec!["Actor".into()],
				)))),
				Clause::Return(ReturnClause::new(vec![Projection::aliased(
					Expr::func("collect", vec![Expr::Var(Var::new("this1"))]),
					Var::new("var0"),
				)])),
			],
		);
		let text = Clause::Call(call).to_string();
		assert_eq!(
			text,
			"CALL {\n\tWITH this0\n\tMATCH (this1:Actor)\n\tRETURN collect(this1) AS var0\n}"
		);
	}

	#[test]
	fn visits_params_in_first_use_order() {
		let this = Var::new("this0");
		let p0 = Param::new("param0", Value::from(1));
		let p1 = Param::new("param1", Value::from(2));
		let clause = Clause::With(WithClause {
			items: vec![Projection::new(Expr::param(&p0))],
			limit: Some(Expr::param(&p1)),
			..Default::default()
		});
		let _ = this;
		let mut seen = Vec::new();
		clause.visit_params(&mut |p| seen.push(p.name().to_owned()));
		assert_eq!(seen, vec!["param0", "param1"]);
	}
}
