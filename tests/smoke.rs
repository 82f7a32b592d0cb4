//! Facade smoke test: the whole pipeline through the public `trellis` crate.

use trellis::catalog::{Attribute, Catalog, ConcreteEntity, Direction, Relationship, ScalarKind};
use trellis::resolve::ResolveTree;
use trellis::translate::{transpile_to_program, OperationKind};
use trellis::val::Value;
use trellis::OperationFactory;

#[test]
fn read_through_the_facade() {
	let mut catalog = Catalog::new();
	catalog.add_entity(
		ConcreteEntity::new("Movie")
			.attribute(Attribute::new("title", ScalarKind::String))
			.relationship(Relationship::new("actors", "ACTED_IN", Direction::In, "Actor")),
	);
	catalog.add_entity(
		ConcreteEntity::new("Actor").attribute(Attribute::new("name", ScalarKind::String)),
	);

	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("movies")
		.arg(
			"where",
			Value::Object([("title".to_owned(), Value::from("Heat"))].into()),
		)
		.field("Movie", ResolveTree::new("title"));
	let operation = factory.read("Movie", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Read).unwrap();
	let (text, params) = program.render();
	assert!(text.starts_with("MATCH (this"), "{text}");
	assert!(text.contains(":Movie)"), "{text}");
	assert_eq!(params.get("param0"), Some(&Value::from("Heat")));
}
