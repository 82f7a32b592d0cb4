use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::MutationKind;
use super::composite::{
	CompositeConnectOperation, CompositeDisconnectOperation, TopLevelCreateMutationOperation,
	TopLevelUpdateMutationOperation,
};
use super::connect::ConnectOperation;
use super::connection::{
	AggregateOp, AggregationSelection, ConnectionReadOperation, Pagination, SortField,
};
use super::context::ParamAllocator;
use super::create::{CreateOperation, EdgeTarget};
use super::disconnect::DisconnectOperation;
use super::filter::{Comparison, Filter, LogicalFilter, LogicalOp, PropertyFilter};
use super::input_field::{
	FieldCallback, InputField, MathInputField, MathOperation, ParamInputField, PopInputField,
	PropertyInputField,
};
use super::operation::MutationOperation;
use super::read::{ProjectionField, ReadOperation};
use super::selection::{NodeSelection, RelationshipSelection, SelectionPattern};
use super::unwind_create::UnwindCreateOperation;
use super::update::UpdateOperation;
use super::AttachedTo;
use indexmap::IndexMap;

use crate::catalog::{Attribute, Catalog, ConcreteEntity, PropertyType, Relationship};
use crate::cnf::{DEFAULT_PAGE_SIZE, MAX_COMPOSITE_FANOUT, MAX_TREE_DEPTH};
use crate::cypher::{Expr, OrderDirection};
use crate::err::Error;
use crate::resolve::ResolveTree;
use crate::val::Value;

/// Builds operation trees from resolve trees and catalog metadata.
///
/// The factory is deliberately thin: it maps request shapes onto the
/// operation structs and raises every static input error before any clause
/// exists. Mutation resolve trees carry their projection selections grouped
/// under the target entity's type name.
#[derive(Debug)]
pub struct OperationFactory<'a> {
	catalog: &'a Catalog,
	params: ParamAllocator,
	jwt: Value,
}

impl<'a> OperationFactory<'a> {
	pub fn new(catalog: &'a Catalog) -> Self {
		Self {
			catalog,
			params: ParamAllocator::new(),
			jwt: Value::None,
		}
	}

	/// Attach the authenticated subject's claims, substituted into
	/// authorization rules and `$jwt.`-prefixed filter values.
	pub fn with_jwt(mut self, claims: Value) -> Self {
		self.jwt = claims;
		self
	}

	pub fn params(&self) -> &ParamAllocator {
		&self.params
	}

	/// Build a plain read over a concrete entity.
	pub fn read(&self, entity_name: &str, request: &ResolveTree) -> Result<ReadOperation> {
		let entity = self.catalog.entity(entity_name)?;
		debug!("building read tree for `{}`", entity.name);
		self.build_read(
			entity,
			request,
			SelectionPattern::Node(NodeSelection::new(entity.labels.clone())),
			1,
		)
	}

	/// Build a paginated connection read over a concrete entity.
	pub fn connection(
		&self,
		entity_name: &str,
		request: &ResolveTree,
	) -> Result<ConnectionReadOperation> {
		let entity = self.catalog.entity(entity_name)?;
		debug!("building connection tree for `{}`", entity.name);
		self.build_connection(
			entity,
			request,
			SelectionPattern::Node(NodeSelection::new(entity.labels.clone())),
			None,
			1,
		)
	}

	/// Build a top-level create over the concrete entities of the target.
	pub fn create(
		&self,
		entity_name: &str,
		request: &ResolveTree,
	) -> Result<TopLevelCreateMutationOperation> {
		let targets = self.concrete_targets(entity_name)?;
		let items = match request.get_arg("input") {
			Some(Value::Array(items)) => items.clone(),
			Some(item @ Value::Object(_)) => vec![item.clone()],
			_ => return Err(Error::invalid_input("create requires an `input` argument").into()),
		};
		let mut creates: Vec<Box<dyn MutationOperation>> = Vec::new();
		for target in &targets {
			for item in &items {
				creates.push(Box::new(self.build_create(target, item, None, None, 1)?));
			}
		}
		Ok(TopLevelCreateMutationOperation::new(entity_name, creates)
			.with_projection_fields(self.projection_fields(entity_name, request)))
	}

	/// Build a top-level bulk create through a single `UNWIND`.
	///
	/// Eligibility of the input shape for the bulk path is certified by the
	/// caller; inputs carrying nested relationship writes are rejected here.
	pub fn unwind_create(
		&self,
		entity_name: &str,
		request: &ResolveTree,
	) -> Result<TopLevelCreateMutationOperation> {
		let entity = self.catalog.entity(entity_name)?;
		let items = match request.get_arg("input") {
			Some(Value::Array(items)) => items.clone(),
			_ => return Err(Error::invalid_input("bulk create requires an `input` list").into()),
		};
		let mut fields: Vec<Box<dyn InputField>> = Vec::new();
		let mut seen: Vec<&str> = Vec::new();
		for item in &items {
			let object = item
				.as_object()
				.ok_or_else(|| Error::invalid_input("bulk create items must be objects"))?;
			for key in object.keys() {
				if entity.relationships.contains_key(key) {
					return Err(Error::invalid_input(
						"bulk create does not take nested relationship input",
					)
					.into());
				}
				if seen.contains(&key.as_str()) {
					continue;
				}
				entity.expect_attribute(key)?;
				seen.push(key);
				fields.push(Box::new(PropertyInputField::new(key.clone(), AttachedTo::Node)));
			}
		}
		for attribute in entity.attributes.values() {
			let Some(ref callback) = attribute.callback else {
				continue;
			};
			if callback.on_create && !seen.contains(&attribute.name.as_str()) {
				fields.push(Box::new(ParamInputField::with_callback(
					attribute.clone(),
					AttachedTo::Node,
					self.params.placeholder(),
					FieldCallback {
						function: callback.function.clone(),
						parent: Value::Array(items.clone()),
						kind: MutationKind::Create,
					},
				)));
			}
		}
		let operation = UnwindCreateOperation::new(
			entity.name.clone(),
			entity.labels.clone(),
			self.params.next(Value::Array(items)),
		)
		.with_input_fields(fields)
		.with_authorization(self.build_authorization(entity)?);
		Ok(TopLevelCreateMutationOperation::new(entity_name, vec![Box::new(operation)])
			.with_projection_fields(self.projection_fields(entity_name, request)))
	}

	/// Build a top-level update over the concrete entities of the target.
	pub fn update(
		&self,
		entity_name: &str,
		request: &ResolveTree,
	) -> Result<TopLevelUpdateMutationOperation> {
		let targets = self.concrete_targets(entity_name)?;
		let mut updates: Vec<Box<dyn MutationOperation>> = Vec::new();
		for target in &targets {
			updates.push(Box::new(self.build_update(target, request, 1)?));
		}
		Ok(TopLevelUpdateMutationOperation::new(entity_name, updates)
			.with_projection_fields(self.projection_fields(entity_name, request)))
	}

	fn concrete_targets(&self, name: &str) -> Result<Vec<&'a ConcreteEntity>> {
		let targets = self.catalog.concrete_targets(name)?;
		if targets.len() > *MAX_COMPOSITE_FANOUT {
			return Err(Error::CompositeFanoutExceeded {
				composite: name.to_owned(),
				fanout: targets.len(),
				max: *MAX_COMPOSITE_FANOUT,
			}
			.into());
		}
		Ok(targets)
	}

	fn check_depth(&self, depth: u32) -> Result<()> {
		if depth > *MAX_TREE_DEPTH {
			return Err(Error::TreeDepthExceeded {
				max: *MAX_TREE_DEPTH,
			}
			.into());
		}
		Ok(())
	}

	/// The projection attribute selections of a mutation response, grouped
	/// under the target's type name.
	fn projection_fields(&self, entity_name: &str, request: &ResolveTree) -> Vec<ProjectionField> {
		request
			.fields
			.on_type(entity_name)
			.filter(|selection| selection.fields.is_empty())
			.map(|selection| ProjectionField::aliased(selection.name.clone(), selection.response_key()))
			.collect()
	}

	fn build_read(
		&self,
		entity: &ConcreteEntity,
		request: &ResolveTree,
		selection: SelectionPattern,
		depth: u32,
	) -> Result<ReadOperation> {
		self.check_depth(depth)?;
		let mut fields = Vec::new();
		let mut nested = Vec::new();
		for child in request.fields.on_type(&entity.name) {
			if let Some(relationship) = entity.relationships.get(&child.name) {
				nested.push(self.build_nested_read(entity, relationship, child, depth + 1)?);
			} else {
				entity.expect_attribute(&child.name)?;
				fields.push(ProjectionField::aliased(child.name.clone(), child.response_key()));
			}
		}
		let filters = match request.get_arg("where") {
			Some(where_arg) => self.build_filters(entity, None, where_arg)?,
			None => Vec::new(),
		};
		Ok(ReadOperation::new(entity.name.clone(), selection)
			.with_response_key(request.response_key())
			.with_filters(filters)
			.with_authorization(self.build_authorization(entity)?)
			.with_fields(fields)
			.with_nested(nested)
			.with_sort(self.build_sort(request.get_arg("sort"), None)?)
			.with_pagination(self.build_pagination(request)))
	}

	fn build_nested_read(
		&self,
		source: &ConcreteEntity,
		relationship: &Relationship,
		request: &ResolveTree,
		depth: u32,
	) -> Result<ReadOperation> {
		let target = self.catalog.entity(&relationship.target).map_err(|_| {
			Error::invalid_input(format!(
				"relationship `{}` on `{}` does not resolve to a concrete entity",
				relationship.name, source.name
			))
		})?;
		self.build_read(
			target,
			request,
			SelectionPattern::Relationship(RelationshipSelection::new(
				relationship,
				target.labels.clone(),
			)),
			depth,
		)
	}

	fn build_connection(
		&self,
		entity: &ConcreteEntity,
		request: &ResolveTree,
		selection: SelectionPattern,
		properties: Option<&PropertyType>,
		depth: u32,
	) -> Result<ConnectionReadOperation> {
		self.check_depth(depth)?;
		let mut pagination = self.build_pagination(request);
		// Page info is only meaningful over a bounded page.
		let wants_page_info = request.fields.all().any(|field| field.name == "pageInfo");
		if wants_page_info && pagination.limit.is_none() {
			pagination.limit =
				Some(self.params.next(Value::from(i64::from(*DEFAULT_PAGE_SIZE))));
		}
		let mut operation = ConnectionReadOperation::new(entity.name.clone(), selection)
			.with_response_key(request.response_key())
			.with_authorization(self.build_authorization(entity)?)
			.with_sort(self.build_sort(request.get_arg("sort"), properties)?)
			.with_pagination(pagination);
		if let Some(where_arg) = request.get_arg("where") {
			operation = operation.with_filters(self.build_filters(entity, properties, where_arg)?);
		}

		for top in request.fields.all() {
			match top.name.as_str() {
				"edges" => {
					let mut node_fields = Vec::new();
					let mut edge_fields = Vec::new();
					let mut nested = Vec::new();
					for edge_child in top.fields.all() {
						match edge_child.name.as_str() {
							"node" => {
								for node_child in edge_child.fields.on_type(&entity.name) {
									if let Some(relationship) =
										entity.relationships.get(&node_child.name)
									{
										nested.push(self.build_nested_read(
											entity,
											relationship,
											node_child,
											depth + 1,
										)?);
									} else {
										entity.expect_attribute(&node_child.name)?;
										node_fields.push(ProjectionField::aliased(
											node_child.name.clone(),
											node_child.response_key(),
										));
									}
								}
							}
							"cursor" => {}
							name => {
								let Some(properties) = properties else {
									return Err(Error::invalid_input(format!(
										"edge field `{name}` requested without relationship properties"
									))
									.into());
								};
								if !properties.attributes.contains_key(name) {
									return Err(Error::UnknownAttribute {
										entity: properties.name.clone(),
										attribute: name.to_owned(),
									}
									.into());
								}
								edge_fields.push(ProjectionField::aliased(
									name,
									edge_child.response_key(),
								));
							}
						}
					}
					operation = operation
						.with_node_fields(node_fields)
						.with_edge_fields(edge_fields)
						.with_nested(nested);
				}
				"totalCount" => operation = operation.with_total_count(),
				"pageInfo" => operation = operation.with_page_info(),
				"aggregate" => {
					operation = operation.with_aggregation(self.build_aggregation(entity, top)?);
				}
				name => {
					return Err(Error::invalid_input(format!(
						"unknown connection field `{name}`"
					))
					.into());
				}
			}
		}
		Ok(operation)
	}

	fn build_aggregation(
		&self,
		entity: &ConcreteEntity,
		request: &ResolveTree,
	) -> Result<AggregationSelection> {
		let mut aggregation = AggregationSelection::default();
		for child in request.fields.all() {
			if child.name == "count" {
				aggregation.count = true;
				continue;
			}
			entity.expect_attribute(&child.name)?;
			for op_child in child.fields.all() {
				let op = match op_child.name.as_str() {
					"min" => AggregateOp::Min,
					"max" => AggregateOp::Max,
					"sum" => AggregateOp::Sum,
					"avg" => AggregateOp::Avg,
					name => {
						return Err(Error::invalid_input(format!(
							"unknown aggregation operator `{name}`"
						))
						.into());
					}
				};
				aggregation.fields.push((
					child.name.clone(),
					op,
					format!("{}_{}", child.response_key(), op_child.response_key()),
				));
			}
		}
		Ok(aggregation)
	}

	fn build_sort(
		&self,
		sort: Option<&Value>,
		properties: Option<&PropertyType>,
	) -> Result<Vec<SortField>> {
		let Some(Value::Array(entries)) = sort else {
			return Ok(Vec::new());
		};
		let mut fields = Vec::new();
		for entry in entries {
			let Some(object) = entry.as_object() else {
				return Err(Error::invalid_input("sort entries must be objects").into());
			};
			for (key, value) in object {
				match (key.as_str(), value) {
					("node", Value::Object(inner)) => {
						for (attribute, direction) in inner {
							fields.push(SortField {
								attribute: attribute.clone(),
								attached_to: AttachedTo::Node,
								direction: parse_direction(direction)?,
							});
						}
					}
					("edge", Value::Object(inner)) => {
						if properties.is_none() {
							return Err(Error::invalid_input(
								"edge sort requested without relationship properties",
							)
							.into());
						}
						for (attribute, direction) in inner {
							fields.push(SortField {
								attribute: attribute.clone(),
								attached_to: AttachedTo::Relationship,
								direction: parse_direction(direction)?,
							});
						}
					}
					(attribute, direction) => {
						fields.push(SortField {
							attribute: attribute.to_owned(),
							attached_to: AttachedTo::Node,
							direction: parse_direction(direction)?,
						});
					}
				}
			}
		}
		Ok(fields)
	}

	fn build_pagination(&self, request: &ResolveTree) -> Pagination {
		Pagination {
			skip: request.get_arg("offset").map(|value| self.params.next(value.clone())),
			limit: request.get_arg("first").map(|value| self.params.next(value.clone())),
		}
	}

	fn build_filters(
		&self,
		entity: &ConcreteEntity,
		properties: Option<&PropertyType>,
		where_arg: &Value,
	) -> Result<Vec<Box<dyn Filter>>> {
		let Some(object) = where_arg.as_object() else {
			return Err(Error::invalid_input("`where` must be an object").into());
		};
		let mut filters: Vec<Box<dyn Filter>> = Vec::new();
		for (key, value) in object {
			match key.as_str() {
				"AND" | "OR" => {
					let Some(children) = value.as_array() else {
						return Err(
							Error::invalid_input(format!("`{key}` must be a list")).into()
						);
					};
					let op = if key == "AND" {
						LogicalOp::And
					} else {
						LogicalOp::Or
					};
					let mut nested: Vec<Box<dyn Filter>> = Vec::new();
					for child in children {
						nested.push(Box::new(LogicalFilter {
							op: LogicalOp::And,
							children: self.build_filters(entity, properties, child)?,
						}));
					}
					filters.push(Box::new(LogicalFilter {
						op,
						children: nested,
					}));
				}
				"NOT" => {
					filters.push(Box::new(LogicalFilter {
						op: LogicalOp::Not,
						children: self.build_filters(entity, properties, value)?,
					}));
				}
				key => {
					let (name, comparison) = Comparison::parse_key(key);
					let attached_to = self.resolve_flat_key(entity, properties, name)?;
					filters.push(Box::new(PropertyFilter {
						attribute: name.to_owned(),
						attached_to,
						comparison,
						value: self.value_expr(value),
					}));
				}
			}
		}
		Ok(filters)
	}

	/// Resolve a flat input key against the node's attributes and, when
	/// present, the relationship's property type. A name living on both
	/// sides is a static error; the request must qualify it.
	fn resolve_flat_key(
		&self,
		entity: &ConcreteEntity,
		properties: Option<&PropertyType>,
		name: &str,
	) -> Result<AttachedTo> {
		let on_node = entity.attributes.contains_key(name);
		let on_edge =
			properties.map(|p| p.attributes.contains_key(name)).unwrap_or(false);
		match (on_node, on_edge) {
			(true, true) => Err(Error::AmbiguousAttribute(name.to_owned()).into()),
			(true, false) => Ok(AttachedTo::Node),
			(false, true) => Ok(AttachedTo::Relationship),
			(false, false) => Err(Error::UnknownAttribute {
				entity: entity.name.clone(),
				attribute: name.to_owned(),
			}
			.into()),
		}
	}

	/// The parameter expression of one request value. String values of the
	/// form `$jwt.<claim>` are substituted with the authenticated subject's
	/// claim.
	fn value_expr(&self, value: &Value) -> Expr {
		if let Some(reference) = value.as_str() {
			if let Some(claim) = reference.strip_prefix("$jwt.") {
				let resolved = self
					.jwt
					.as_object()
					.and_then(|claims| claims.get(claim))
					.cloned()
					.unwrap_or(Value::None);
				return Expr::param(&self.params.next(resolved));
			}
		}
		Expr::param(&self.params.next(value.clone()))
	}

	fn build_authorization(&self, entity: &ConcreteEntity) -> Result<AuthorizationFilters> {
		let mut authorization = AuthorizationFilters::new();
		let Some(ref rules) = entity.authorization else {
			return Ok(authorization);
		};
		for rule in &rules.filter {
			authorization.add_filter_rule(Box::new(LogicalFilter {
				op: LogicalOp::And,
				children: self.build_filters(entity, None, rule)?,
			}));
		}
		for rule in &rules.validate_before {
			authorization.add_validation_rule(
				AuthTiming::Before,
				Box::new(LogicalFilter {
					op: LogicalOp::And,
					children: self.build_filters(entity, None, rule)?,
				}),
			);
		}
		for rule in &rules.validate_after {
			authorization.add_validation_rule(
				AuthTiming::After,
				Box::new(LogicalFilter {
					op: LogicalOp::And,
					children: self.build_filters(entity, None, rule)?,
				}),
			);
		}
		Ok(authorization)
	}

	/// Build the attribute writes of one input object, including callback
	/// placeholders for attributes the input does not supply.
	fn build_input_fields(
		&self,
		entity_attributes: &IndexMap<String, Attribute>,
		entity_name: &str,
		input: &Value,
		kind: MutationKind,
		attached_to: AttachedTo,
	) -> Result<Vec<Box<dyn InputField>>> {
		let Some(object) = input.as_object() else {
			return Err(Error::invalid_input("mutation input must be an object").into());
		};
		let mut fields: Vec<Box<dyn InputField>> = Vec::new();
		for (key, value) in object {
			if let Some((name, operation)) = MathOperation::parse_key(key) {
				let attribute = entity_attributes.get(name).ok_or_else(|| Error::UnknownAttribute {
					entity: entity_name.to_owned(),
					attribute: name.to_owned(),
				})?;
				fields.push(Box::new(MathInputField::new(
					attribute.clone(),
					attached_to,
					operation,
					self.params.next(value.clone()),
				)?));
			} else if let Some(name) = key.strip_suffix("_POP") {
				let attribute = entity_attributes.get(name).ok_or_else(|| Error::UnknownAttribute {
					entity: entity_name.to_owned(),
					attribute: name.to_owned(),
				})?;
				fields.push(Box::new(PopInputField::new(
					attribute.clone(),
					attached_to,
					self.params.next(value.clone()),
				)));
			} else {
				let attribute = entity_attributes.get(key).ok_or_else(|| Error::UnknownAttribute {
					entity: entity_name.to_owned(),
					attribute: key.to_owned(),
				})?;
				fields.push(Box::new(ParamInputField::new(
					attribute.clone(),
					attached_to,
					self.params.next(value.clone()),
				)));
			}
		}
		for attribute in entity_attributes.values() {
			let Some(ref callback) = attribute.callback else {
				continue;
			};
			let applies = match kind {
				MutationKind::Create => callback.on_create,
				MutationKind::Update => callback.on_update,
			};
			if applies && !object.contains_key(&attribute.name) {
				fields.push(Box::new(ParamInputField::with_callback(
					attribute.clone(),
					attached_to,
					self.params.placeholder(),
					FieldCallback {
						function: callback.function.clone(),
						parent: input.clone(),
						kind,
					},
				)));
			}
		}
		Ok(fields)
	}

	fn build_create(
		&self,
		entity: &ConcreteEntity,
		input: &Value,
		edge: Option<EdgeTarget>,
		properties: Option<&PropertyType>,
		depth: u32,
	) -> Result<CreateOperation> {
		self.check_depth(depth)?;
		let Some(object) = input.as_object() else {
			return Err(Error::invalid_input("create input must be an object").into());
		};

		let mut attributes = Value::Object(Default::default());
		let mut edge_attributes: Option<&Value> = None;
		let mut nested: Vec<Box<dyn MutationOperation>> = Vec::new();
		if let Value::Object(ref mut plain) = attributes {
			for (key, value) in object {
				if key == "edge" {
					edge_attributes = Some(value);
				} else if let Some(relationship) = entity.relationships.get(key) {
					nested.extend(self.build_relationship_input(
						entity,
						relationship,
						value,
						depth + 1,
					)?);
				} else {
					plain.insert(key.clone(), value.clone());
				}
			}
		}

		let mut fields = self.build_input_fields(
			&entity.attributes,
			&entity.name,
			&attributes,
			MutationKind::Create,
			AttachedTo::Node,
		)?;
		if let Some(edge_input) = edge_attributes {
			let properties = properties.ok_or_else(|| {
				Error::invalid_input("edge attributes supplied without relationship properties")
			})?;
			fields.extend(self.build_input_fields(
				&properties.attributes,
				&properties.name,
				edge_input,
				MutationKind::Create,
				AttachedTo::Relationship,
			)?);
		}

		let mut operation = CreateOperation::new(entity.name.clone(), entity.labels.clone())
			.with_input_fields(fields)
			.with_nested(nested)
			.with_authorization(self.build_authorization(entity)?);
		if let Some(edge) = edge {
			operation = operation.with_edge(edge);
		}
		Ok(operation)
	}

	/// The nested mutation operations of one relationship input value:
	/// `create` items, `connect` items and `disconnect` items.
	fn build_relationship_input(
		&self,
		source: &ConcreteEntity,
		relationship: &Relationship,
		input: &Value,
		depth: u32,
	) -> Result<Vec<Box<dyn MutationOperation>>> {
		self.check_depth(depth)?;
		let Some(object) = input.as_object() else {
			return Err(Error::invalid_input("relationship input must be an object").into());
		};
		let properties =
			relationship.properties.as_deref().and_then(|name| self.catalog.property_type(name));
		let mut nested: Vec<Box<dyn MutationOperation>> = Vec::new();
		for (key, value) in object {
			match key.as_str() {
				"create" => {
					let target = self.catalog.entity(&relationship.target)?;
					for item in items_of(value) {
						nested.push(Box::new(self.build_create(
							target,
							item,
							Some(EdgeTarget::new(
								relationship.rel_type.clone(),
								relationship.direction,
							)),
							properties,
							depth + 1,
						)?));
					}
				}
				"connect" => {
					for item in items_of(value) {
						nested.push(self.build_connect(source, relationship, item, properties)?);
					}
				}
				"disconnect" => {
					for item in items_of(value) {
						nested.push(self.build_disconnect(
							source,
							relationship,
							item,
							properties,
						)?);
					}
				}
				"update" => {
					let target = self.catalog.entity(&relationship.target)?;
					nested.push(Box::new(self.build_nested_update(
						target,
						relationship,
						value,
						depth + 1,
					)?));
				}
				key => {
					return Err(Error::invalid_input(format!(
						"unknown relationship operation `{key}`"
					))
					.into());
				}
			}
		}
		Ok(nested)
	}

	fn build_connect(
		&self,
		source: &ConcreteEntity,
		relationship: &Relationship,
		item: &Value,
		properties: Option<&PropertyType>,
	) -> Result<Box<dyn MutationOperation>> {
		let targets = self.concrete_targets(&relationship.target)?;
		let mut partials = Vec::with_capacity(targets.len());
		for target in &targets {
			let mut operation = ConnectOperation::new(
				target.name.clone(),
				target.labels.clone(),
				relationship.rel_type.clone(),
				relationship.direction,
			)
			.with_cardinality(relationship.cardinality)
			.with_authorization(self.build_authorization(target)?)
			.with_source_authorization(self.build_authorization(source)?);
			if let Some(where_arg) = item.as_object().and_then(|o| o.get("where")) {
				operation = operation.with_filters(self.build_filters(target, None, where_arg)?);
			}
			if let Some(edge_input) = item.as_object().and_then(|o| o.get("edge")) {
				let properties = properties.ok_or_else(|| {
					Error::invalid_input(
						"edge attributes supplied without relationship properties",
					)
				})?;
				// An attribute living on both the edge and the endpoint
				// entity must be qualified, never guessed at.
				if let Some(edge_object) = edge_input.as_object() {
					for key in edge_object.keys() {
						if properties.attributes.contains_key(key)
							&& target.attributes.contains_key(key)
						{
							return Err(Error::AmbiguousAttribute(key.clone()).into());
						}
					}
				}
				operation = operation.with_edge_fields(self.build_input_fields(
					&properties.attributes,
					&properties.name,
					edge_input,
					MutationKind::Create,
					AttachedTo::Relationship,
				)?);
			}
			partials.push(operation);
		}
		if partials.len() == 1 {
			Ok(Box::new(partials.pop().expect("one partial")))
		} else {
			Ok(Box::new(CompositeConnectOperation::new(relationship.target.clone(), partials)))
		}
	}

	fn build_disconnect(
		&self,
		source: &ConcreteEntity,
		relationship: &Relationship,
		item: &Value,
		properties: Option<&PropertyType>,
	) -> Result<Box<dyn MutationOperation>> {
		let targets = self.concrete_targets(&relationship.target)?;
		let mut partials = Vec::with_capacity(targets.len());
		for target in &targets {
			let mut operation = DisconnectOperation::new(
				target.name.clone(),
				target.labels.clone(),
				relationship.rel_type.clone(),
				relationship.direction,
			)
			.with_authorization(self.build_authorization(target)?)
			.with_source_authorization(self.build_authorization(source)?);
			if let Some(where_arg) = item.as_object().and_then(|o| o.get("where")) {
				operation =
					operation.with_filters(self.build_filters(target, properties, where_arg)?);
			}
			partials.push(operation);
		}
		if partials.len() == 1 {
			Ok(Box::new(partials.pop().expect("one partial")))
		} else {
			Ok(Box::new(CompositeDisconnectOperation::new(relationship.target.clone(), partials)))
		}
	}

	fn build_update(
		&self,
		entity: &ConcreteEntity,
		request: &ResolveTree,
		depth: u32,
	) -> Result<UpdateOperation> {
		self.check_depth(depth)?;
		let mut operation = UpdateOperation::new(
			entity.name.clone(),
			SelectionPattern::Node(NodeSelection::new(entity.labels.clone())),
		)
		.with_authorization(self.build_authorization(entity)?);
		if let Some(where_arg) = request.get_arg("where") {
			operation = operation.with_filters(self.build_filters(entity, None, where_arg)?);
		}
		let mut nested: Vec<Box<dyn MutationOperation>> = Vec::new();
		if let Some(update_arg) = request.get_arg("update") {
			let (fields, update_nested) =
				self.build_update_input(entity, update_arg, depth + 1)?;
			operation = operation.with_input_fields(fields);
			nested.extend(update_nested);
		}
		for (arg, key) in [("connect", "connect"), ("disconnect", "disconnect")] {
			if let Some(Value::Object(by_relationship)) = request.get_arg(arg) {
				for (field, items) in by_relationship {
					let relationship = entity.expect_relationship(field)?;
					let properties = relationship
						.properties
						.as_deref()
						.and_then(|name| self.catalog.property_type(name));
					for item in items_of(items) {
						nested.push(match key {
							"connect" => {
								self.build_connect(entity, relationship, item, properties)?
							}
							_ => self.build_disconnect(entity, relationship, item, properties)?,
						});
					}
				}
			}
		}
		Ok(operation.with_nested(nested))
	}

	fn build_nested_update(
		&self,
		target: &ConcreteEntity,
		relationship: &Relationship,
		input: &Value,
		depth: u32,
	) -> Result<UpdateOperation> {
		self.check_depth(depth)?;
		let mut operation = UpdateOperation::new(
			target.name.clone(),
			SelectionPattern::Relationship(RelationshipSelection::new(
				relationship,
				target.labels.clone(),
			)),
		)
		.with_authorization(self.build_authorization(target)?);
		let Some(object) = input.as_object() else {
			return Err(Error::invalid_input("nested update input must be an object").into());
		};
		if let Some(where_arg) = object.get("where") {
			operation = operation.with_filters(self.build_filters(target, None, where_arg)?);
		}
		if let Some(node_input) = object.get("node") {
			let (fields, nested) = self.build_update_input(target, node_input, depth + 1)?;
			operation = operation.with_input_fields(fields).with_nested(nested);
		}
		Ok(operation)
	}

	/// Split one update input object into attribute writes and nested
	/// relationship mutations.
	fn build_update_input(
		&self,
		entity: &ConcreteEntity,
		input: &Value,
		depth: u32,
	) -> Result<(Vec<Box<dyn InputField>>, Vec<Box<dyn MutationOperation>>)> {
		let Some(object) = input.as_object() else {
			return Err(Error::invalid_input("update input must be an object").into());
		};
		let mut attributes = Value::Object(Default::default());
		let mut nested: Vec<Box<dyn MutationOperation>> = Vec::new();
		if let Value::Object(ref mut plain) = attributes {
			for (key, value) in object {
				if let Some(relationship) = entity.relationships.get(key) {
					nested.extend(self.build_relationship_input(
						entity,
						relationship,
						value,
						depth + 1,
					)?);
				} else {
					plain.insert(key.clone(), value.clone());
				}
			}
		}
		let fields = self.build_input_fields(
			&entity.attributes,
			&entity.name,
			&attributes,
			MutationKind::Update,
			AttachedTo::Node,
		)?;
		Ok((fields, nested))
	}
}

fn items_of(value: &Value) -> Vec<&Value> {
	match value {
		Value::Array(items) => items.iter().collect(),
		other => vec![other],
	}
}

fn parse_direction(value: &Value) -> Result<OrderDirection> {
	match value.as_str() {
		Some("ASC") => Ok(OrderDirection::Ascending),
		Some("DESC") => Ok(OrderDirection::Descending),
		_ => Err(Error::invalid_input("sort direction must be ASC or DESC").into()),
	}
}
