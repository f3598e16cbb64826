//! Resource and data source traits
//!
//! Handlers implement the typed traits over their own serde model; the
//! blanket impls turn them into the object-safe [`Resource`] / [`DataSource`]
//! traits the dispatch table stores, doing the JSON conversion and schema
//! validation in one place.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::diagnostics::Diagnostics;
use super::schema::Schema;
use crate::client::PrismApi;
use crate::wait::{OpContext, PollPolicy};

/// Polling budgets used by handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOptions {
    pub dependency: PollPolicy,
    pub cascade: PollPolicy,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            dependency: PollPolicy::dependency(),
            cascade: PollPolicy::cascade(),
        }
    }
}

/// Everything a handler needs for one call
pub struct ResourceEnv<'a> {
    pub api: &'a dyn PrismApi,
    pub ctx: &'a OpContext,
    pub options: ResourceOptions,
}

/// A resource handler over a typed model
pub trait TypedResource: Send + Sync {
    type Model: Serialize + DeserializeOwned;

    const TYPE_NAME: &'static str;

    /// Attribute that receives the import id when [`import_state`](Self::import_state) is not overridden
    const IMPORT_ATTRIBUTE: &'static str;

    fn schema(&self) -> Schema;

    /// Semantic checks beyond the schema, run before any API call
    fn validate(&self, _model: &Self::Model, _diags: &mut Diagnostics) {}

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    /// `None` without an error diagnostic means the object is gone
    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: Self::Model,
        plan: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    fn delete(&self, env: &ResourceEnv<'_>, state: Self::Model, diags: &mut Diagnostics);

    /// Turn an import id into a partial state for the following read
    fn import_state(&self, id: &str, _diags: &mut Diagnostics) -> Option<Value> {
        let mut state = Map::new();
        state.insert(Self::IMPORT_ATTRIBUTE.to_string(), Value::String(id.to_string()));
        Some(Value::Object(state))
    }
}

/// A data source handler over a typed model
pub trait TypedDataSource: Send + Sync {
    type Model: Serialize + DeserializeOwned;

    const TYPE_NAME: &'static str;

    fn schema(&self) -> Schema;

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        config: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;
}

/// Object-safe resource interface used by the dispatch table
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn validate(&self, config: &Value, diags: &mut Diagnostics);
    fn create(&self, env: &ResourceEnv<'_>, planned: Value, diags: &mut Diagnostics) -> Option<Value>;
    fn read(&self, env: &ResourceEnv<'_>, state: Value, diags: &mut Diagnostics) -> Option<Value>;
    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: Value,
        planned: Value,
        diags: &mut Diagnostics,
    ) -> Option<Value>;
    fn delete(&self, env: &ResourceEnv<'_>, state: Value, diags: &mut Diagnostics);
    fn import(&self, env: &ResourceEnv<'_>, id: &str, diags: &mut Diagnostics) -> Option<Value>;
}

/// Object-safe data source interface used by the dispatch table
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn read(&self, env: &ResourceEnv<'_>, config: Value, diags: &mut Diagnostics) -> Option<Value>;
}

fn decode<M: DeserializeOwned>(value: Value, what: &str, diags: &mut Diagnostics) -> Option<M> {
    match serde_json::from_value(value) {
        Ok(model) => Some(model),
        Err(err) => {
            diags.add_error(
                format!("Invalid {}", what),
                format!("Unable to decode {}: {}", what.to_lowercase(), err),
            );
            None
        }
    }
}

fn encode<M: Serialize>(model: &M, diags: &mut Diagnostics) -> Option<Value> {
    match serde_json::to_value(model) {
        Ok(value) => Some(value),
        Err(err) => {
            diags.add_error(
                "Serialization Error",
                format!("Unable to encode state: {}", err),
            );
            None
        }
    }
}

fn prepare<R: TypedResource + ?Sized>(
    resource: &R,
    mut value: Value,
    what: &str,
    diags: &mut Diagnostics,
) -> Option<R::Model> {
    let schema = TypedResource::schema(resource);
    schema.apply_defaults(&mut value);
    schema.validate(&value, diags);
    if diags.has_error() {
        return None;
    }
    let model = decode::<R::Model>(value, what, diags)?;
    TypedResource::validate(resource, &model, diags);
    if diags.has_error() {
        return None;
    }
    Some(model)
}

impl<R: TypedResource> Resource for R {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        TypedResource::schema(self)
    }

    fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        prepare(self, config.clone(), "Plan", diags);
    }

    fn create(&self, env: &ResourceEnv<'_>, planned: Value, diags: &mut Diagnostics) -> Option<Value> {
        let plan = prepare(self, planned, "Plan", diags)?;
        let state = TypedResource::create(self, env, plan, diags)?;
        encode(&state, diags)
    }

    fn read(&self, env: &ResourceEnv<'_>, state: Value, diags: &mut Diagnostics) -> Option<Value> {
        let state = decode::<R::Model>(state, "State", diags)?;
        let state = TypedResource::read(self, env, state, diags)?;
        encode(&state, diags)
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: Value,
        planned: Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let prior = decode::<R::Model>(prior, "State", diags)?;
        let plan = prepare(self, planned, "Plan", diags)?;
        let state = TypedResource::update(self, env, prior, plan, diags)?;
        encode(&state, diags)
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: Value, diags: &mut Diagnostics) {
        if let Some(state) = decode::<R::Model>(state, "State", diags) {
            TypedResource::delete(self, env, state, diags);
        }
    }

    fn import(&self, env: &ResourceEnv<'_>, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let partial = TypedResource::import_state(self, id, diags)?;
        let state = Resource::read(self, env, partial, diags);
        if state.is_none() && !diags.has_error() {
            diags.add_error(
                "Cannot Import Non-Existent Remote Object",
                format!(
                    "While attempting to import an existing object to \"{}\", the provider detected that no object exists with the given id \"{}\".",
                    R::TYPE_NAME,
                    id
                ),
            );
        }
        state
    }
}

impl<D: TypedDataSource> DataSource for D {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        TypedDataSource::schema(self)
    }

    fn read(&self, env: &ResourceEnv<'_>, config: Value, diags: &mut Diagnostics) -> Option<Value> {
        TypedDataSource::schema(self).validate(&config, diags);
        if diags.has_error() {
            return None;
        }
        let config = decode::<D::Model>(config, "Configuration", diags)?;
        let state = TypedDataSource::read(self, env, config, diags)?;
        encode(&state, diags)
    }
}
