//! End-to-end translation tests: factory, callback resolution, lowering and
//! rendering.

use trellis_core::catalog::{
	Attribute, AttributeCallback, Catalog, CompositeEntity, CompositeKind, ConcreteEntity,
	Direction, EntityAuthorization, Relationship, ScalarKind,
};
use trellis_core::resolve::ResolveTree;
use trellis_core::translate::{
	print, transpile_to_program, translate, AuthTiming, CallbackRegistry, MutationOperation,
	Operation, OperationFactory, OperationKind,
};
use trellis_core::val::Value;

fn object(entries: &[(&str, Value)]) -> Value {
	Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

fn movie_catalog() -> Catalog {
	let mut catalog = Catalog::new();
	catalog.add_entity(
		ConcreteEntity::new("Movie")
			.attribute(Attribute::new("title", ScalarKind::String))
			.attribute(Attribute::new("viewCount", ScalarKind::Int))
			.attribute(Attribute::new("released", ScalarKind::Datetime))
			.attribute(Attribute::new("tags", ScalarKind::String).list())
			.attribute(Attribute::new("slug", ScalarKind::String).with_callback(
				AttributeCallback {
					function: "slugify".to_owned(),
					on_create: true,
					on_update: false,
				},
			))
			.relationship(
				Relationship::new("actors", "ACTED_IN", Direction::In, "Actor")
					.with_properties("ActedIn"),
			),
	);
	catalog.add_entity(
		ConcreteEntity::new("Actor")
			.attribute(Attribute::new("name", ScalarKind::String))
			.relationship(Relationship::new("movies", "ACTED_IN", Direction::Out, "Movie")),
	);
	catalog.add_property_type(
		trellis_core::catalog::PropertyType::new("ActedIn")
			.attribute(Attribute::new("role", ScalarKind::String)),
	);
	catalog
}

#[test_log::test]
fn read_renders_a_complete_program() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("movies")
		.arg("where", object(&[("title", Value::from("The Matrix"))]))
		.field("Movie", ResolveTree::new("title"))
		.field(
			"Movie",
			ResolveTree::new("actors").field("Actor", ResolveTree::new("name")),
		);
	let operation = factory.read("Movie", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Read).unwrap();
	let (text, params) = program.render();
	assert!(text.starts_with("MATCH (this"), "{text}");
	assert!(text.contains("WHERE"), "{text}");
	assert!(text.contains("CALL {"), "{text}");
	assert!(text.contains(":ACTED_IN]"), "{text}");
	assert!(text.trim_end().ends_with("AS this"), "{text}");
	assert_eq!(params.get("param0"), Some(&Value::from("The Matrix")));
}

#[tokio::test]
async fn create_resolves_callbacks_before_lowering() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("createMovies")
		.arg(
			"input",
			Value::Array(vec![object(&[("title", Value::from("The Matrix"))])]),
		)
		.field("Movie", ResolveTree::new("title"))
		.field("Movie", ResolveTree::new("slug"));
	let operation = factory.create("Movie", &request).unwrap();

	let mut registry = CallbackRegistry::new();
	registry.register("slugify", |parent, kind| async move {
		assert_eq!(kind.to_string(), "CREATE");
		let title = parent
			.as_object()
			.and_then(|o| o.get("title"))
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_lowercase()
			.replace(' ', "-");
		Ok(Value::from(title))
	});

	let program = translate(&operation, OperationKind::Create, &registry).await.unwrap();
	let (text, params) = program.render();
	assert!(text.contains("CREATE (this"), "{text}");
	assert!(text.contains(".slug"), "{text}");
	assert!(params.values().any(|v| v == &Value::from("the-matrix")), "{params:?}");
}

#[tokio::test]
async fn unresolved_callback_contributes_no_write() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("createMovies").arg(
		"input",
		Value::Array(vec![object(&[("title", Value::from("Alien"))])]),
	);
	let operation = factory.create("Movie", &request).unwrap();

	let mut registry = CallbackRegistry::new();
	registry.register("slugify", |_parent, _kind| async { Ok(Value::None) });

	let program = translate(&operation, OperationKind::Create, &registry).await.unwrap();
	let text = program.to_string();
	assert!(!text.contains(".slug ="), "{text}");
	assert!(text.contains(".title ="), "{text}");
}

#[test]
fn update_with_math_field_guards_the_write() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("updateMovies")
		.arg("where", object(&[("title", Value::from("Alien"))]))
		.arg(
			"update",
			object(&[("viewCount_INCREMENT", Value::from(1)), ("tags_POP", Value::from(2))]),
		);
	let operation = factory.update("Movie", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Update).unwrap();
	let text = program.to_string();
	let null_guard = text.find("IS NOT NULL").expect("null guard");
	let overflow_guard = text.find("2147483647").expect("overflow guard");
	let write = text.find("SET").expect("write");
	assert!(null_guard < write, "{text}");
	assert!(overflow_guard < write, "{text}");
	assert!(text.contains("[..-$param"), "{text}");
}

#[test]
fn update_folds_before_authorization_into_the_where() {
	let mut catalog = movie_catalog();
	catalog.add_entity(
		ConcreteEntity::new("Post")
			.attribute(Attribute::new("body", ScalarKind::String))
			.attribute(Attribute::new("authorId", ScalarKind::Id))
			.with_authorization(EntityAuthorization {
				filter: vec![object(&[("authorId", Value::from("$jwt.sub"))])],
				validate_before: vec![object(&[("authorId", Value::from("$jwt.sub"))])],
				validate_after: vec![object(&[("authorId", Value::from("$jwt.sub"))])],
			}),
	);
	let factory =
		OperationFactory::new(&catalog).with_jwt(object(&[("sub", Value::from("user-1"))]));
	let request = ResolveTree::new("updatePosts")
		.arg("update", object(&[("body", Value::from("edited"))]));
	let operation = factory.update("Post", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Update).unwrap();
	let (text, params) = program.render();
	let where_at = text.find("WHERE").expect("authorization predicate");
	let before_guard = text.find("apoc.util.validate").expect("before guard");
	let write = text.find("SET").expect("write");
	assert!(where_at < before_guard && before_guard < write, "{text}");
	// The AFTER guard lands behind the write.
	assert!(text.rfind("apoc.util.validate").unwrap() > write, "{text}");
	assert!(params.values().any(|v| v == &Value::from("user-1")), "{params:?}");
}

#[test]
fn composite_disconnect_fans_out_in_member_order() {
	let mut catalog = Catalog::new();
	catalog.add_entity(
		ConcreteEntity::new("Author")
			.attribute(Attribute::new("name", ScalarKind::String))
			.relationship(Relationship::new("works", "AUTHORED", Direction::Out, "Work")),
	);
	for member in ["Book", "Film", "Song"] {
		catalog.add_entity(
			ConcreteEntity::new(member).attribute(Attribute::new("title", ScalarKind::String)),
		);
	}
	catalog.add_composite(CompositeEntity::new(
		"Work",
		CompositeKind::Union,
		vec!["Book".into(), "Film".into(), "Song".into()],
	));

	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("updateAuthors").arg(
		"disconnect",
		object(&[("works", object(&[("where", object(&[("title", Value::from("x"))]))]))]),
	);
	let operation = factory.update("Author", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Update).unwrap();
	let text = program.to_string();
	let book = text.find(":Book)").expect("Book partial");
	let film = text.find(":Film)").expect("Film partial");
	let song = text.find(":Song)").expect("Song partial");
	assert!(book < film && film < song, "{text}");
	assert_eq!(text.matches("OPTIONAL MATCH").count(), 3, "{text}");
	assert_eq!(text.matches("DELETE").count(), 3, "{text}");
}

#[test]
fn composite_partials_concatenate_authorization_lists() {
	use trellis_core::translate::{CompositeConnectOperation, ConnectOperation, TranslateContext};
	use trellis_core::translate::Env;

	let mut partials = Vec::new();
	for member in ["Book", "Film", "Song"] {
		let mut auth = trellis_core::translate::AuthorizationFilters::new();
		auth.add_validation_rule(
			AuthTiming::After,
			Box::new(trellis_core::translate::PropertyFilter {
				attribute: "title".into(),
				attached_to: trellis_core::translate::AttachedTo::Node,
				comparison: trellis_core::translate::Comparison::Eq,
				value: trellis_core::cypher::Expr::int(1),
			}),
		);
		partials.push(
			ConnectOperation::new(member, vec![member.into()], "AUTHORED", Direction::Out)
				.with_authorization(auth),
		);
	}
	let op = CompositeConnectOperation::new("Work", partials);
	let ctx = TranslateContext::new(Env {
		top_level_operation: OperationKind::Update,
	});
	let transpiled = op.transpile(&ctx).unwrap();
	assert!(!transpiled.clauses.is_empty());
	// One AFTER guard per partial, concatenated in member order.
	let guards = op.authorization_clauses(AuthTiming::After).unwrap();
	assert_eq!(guards.len(), 3);
}

#[test]
fn connection_read_skips_edges_for_count_only_requests() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("moviesConnection").field(
		"MovieConnection",
		ResolveTree::new("totalCount"),
	);
	let operation = factory.connection("Movie", &request).unwrap();
	assert!(!operation.should_project_edges());
	let program = transpile_to_program(&operation, OperationKind::Read).unwrap();
	let text = program.to_string();
	assert!(!text.contains("UNWIND"), "{text}");

	let request = ResolveTree::new("moviesConnection").field(
		"MovieConnection",
		ResolveTree::new("edges").field(
			"MovieEdge",
			ResolveTree::new("node").field("Movie", ResolveTree::new("title")),
		),
	);
	let operation = factory.connection("Movie", &request).unwrap();
	assert!(operation.should_project_edges());
	let program = transpile_to_program(&operation, OperationKind::Read).unwrap();
	let text = program.to_string();
	assert!(text.contains("UNWIND"), "{text}");
}

#[test]
fn connection_sort_and_paging_order() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("moviesConnection")
		.arg("sort", Value::Array(vec![object(&[("title", Value::from("DESC"))])]))
		.arg("first", Value::from(10))
		.field(
			"MovieConnection",
			ResolveTree::new("edges").field(
				"MovieEdge",
				ResolveTree::new("node").field("Movie", ResolveTree::new("title")),
			),
		);
	let operation = factory.connection("Movie", &request).unwrap();
	let program = transpile_to_program(&operation, OperationKind::Read).unwrap();
	let text = program.to_string();
	let unwind = text.find("UNWIND").unwrap();
	let order = text.find("ORDER BY").unwrap();
	let limit = text.find("LIMIT").unwrap();
	let recollect = text.rfind("collect(").unwrap();
	assert!(unwind < order && order < limit && limit < recollect, "{text}");
}

#[test]
fn print_renders_the_tree_outline() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("movies").field(
		"Movie",
		ResolveTree::new("actors").field("Actor", ResolveTree::new("name")),
	);
	let operation = factory.read("Movie", &request).unwrap();
	let outline = print(&operation);
	assert!(outline.starts_with("ReadOperation<Movie>"), "{outline}");
	assert!(outline.contains("  ReadOperation<Actor>"), "{outline}");
}

#[test]
fn division_by_literal_zero_is_a_static_error() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("updateMovies")
		.arg("update", object(&[("viewCount_DIVIDE", Value::from(0))]));
	let err = factory.update("Movie", &request).unwrap_err();
	assert!(err.to_string().contains("by zero"), "{err}");
}

#[test]
fn ambiguous_flat_attribute_is_rejected() {
	// `role` lives on both the edge and the endpoint entity.
	let mut catalog = Catalog::new();
	catalog.add_entity(
		ConcreteEntity::new("Actor")
			.attribute(Attribute::new("name", ScalarKind::String))
			.relationship(
				Relationship::new("movies", "ACTED_IN", Direction::Out, "Movie")
					.with_properties("ActedIn"),
			),
	);
	catalog.add_entity(
		ConcreteEntity::new("Movie").attribute(Attribute::new("role", ScalarKind::String)),
	);
	catalog.add_property_type(
		trellis_core::catalog::PropertyType::new("ActedIn")
			.attribute(Attribute::new("role", ScalarKind::String)),
	);
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("updateActors").arg(
		"disconnect",
		object(&[(
			"movies",
			object(&[("where", object(&[("role", Value::from("Neo"))]))]),
		)]),
	);
	let err = factory.update("Actor", &request).unwrap_err();
	assert!(err.to_string().contains("ambiguous"), "{err}");
}

#[tokio::test]
async fn bulk_create_unwinds_a_single_parameter() {
	let catalog = movie_catalog();
	let factory = OperationFactory::new(&catalog);
	let request = ResolveTree::new("createMovies")
		.arg(
			"input",
			Value::Array(vec![
				object(&[("title", Value::from("A"))]),
				object(&[("title", Value::from("B"))]),
				object(&[("title", Value::from("C"))]),
			]),
		)
		.field("Movie", ResolveTree::new("title"));
	let operation = factory.unwind_create("Movie", &request).unwrap();
	let mut registry = CallbackRegistry::new();
	registry.register("slugify", |_parent, _kind| async { Ok(Value::None) });
	let program = translate(&operation, OperationKind::Create, &registry).await.unwrap();
	let (text, params) = program.render();
	assert_eq!(text.matches("UNWIND").count(), 1, "{text}");
	assert_eq!(text.matches("CREATE (").count(), 1, "{text}");
	let list = params.values().find(|v| matches!(v, Value::Array(_))).expect("list param");
	assert_eq!(list.as_array().unwrap().len(), 3);
}
