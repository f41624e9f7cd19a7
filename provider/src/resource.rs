/*!

The contract every managed resource type and data source implements.

A resource works with a typed attribute state (`Resource::State`). The manager only sees
`serde_json::Value`s, so [`DynamicResource`] and [`DynamicDataSource`] erase the state type and are
implemented for every `Resource` and `DataSource`.

!*/

use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use model::Configuration;
use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How long create, update and delete may take, including the waits for state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

/// Per-operation timeout overrides in seconds, as written in a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<u64>,
}

impl Timeouts {
    pub fn with_overrides(self, overrides: &TimeoutOverrides) -> Self {
        Self {
            create: overrides
                .create
                .map(Duration::from_secs)
                .unwrap_or(self.create),
            update: overrides
                .update
                .map(Duration::from_secs)
                .unwrap_or(self.update),
            delete: overrides
                .delete
                .map(Duration::from_secs)
                .unwrap_or(self.delete),
        }
    }
}

/// The attribute state of a resource.
pub trait ResourceState: Configuration + JsonSchema {
    /// The remote id, empty until the resource has been created.
    fn id(&self) -> &str;

    /// Check required and conflicting attributes before the state is sent anywhere.
    fn validate(&self) -> ProviderResult<()> {
        Ok(())
    }
}

/// The create/read/update/delete/import lifecycle of one resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync + 'static {
    type State: ResourceState;

    /// The name used in manifests, e.g. `rancher2_namespace`.
    const TYPE_NAME: &'static str;

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Whether moving from `prior` to `planned` needs the object to be destroyed and created again.
    fn requires_replace(&self, _prior: &Self::State, _planned: &Self::State) -> bool {
        false
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: Self::State,
        timeouts: &Timeouts,
    ) -> ProviderResult<Self::State>;

    /// Refresh `state` from the server. `None` means the object no longer exists.
    async fn read(&self, meta: &Meta, state: Self::State) -> ProviderResult<Option<Self::State>>;

    async fn update(
        &self,
        meta: &Meta,
        prior: Self::State,
        planned: Self::State,
        timeouts: &Timeouts,
    ) -> ProviderResult<Self::State>;

    async fn delete(&self, meta: &Meta, state: Self::State, timeouts: &Timeouts)
        -> ProviderResult<()>;

    /// Build states for an existing object from an import id.
    async fn import(&self, _meta: &Meta, _id: &str) -> ProviderResult<Vec<Self::State>> {
        Err(ProviderError::new_with_context(format!(
            "Resource type '{}' does not support import",
            Self::TYPE_NAME
        )))
    }
}

/// A read-only lookup.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync + 'static {
    type State: Configuration + JsonSchema;

    const TYPE_NAME: &'static str;

    /// Fill the computed attributes of `config`.
    async fn read(&self, meta: &Meta, config: Self::State) -> ProviderResult<Self::State>;
}

/// A [`Resource`] with its state type erased.
#[async_trait::async_trait]
pub trait DynamicResource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> RootSchema;
    fn default_timeouts(&self) -> Timeouts;
    /// Decode and validate attributes.
    fn validate(&self, attributes: &Value) -> ProviderResult<()>;
    fn requires_replace(&self, prior: &Value, planned: &Value) -> ProviderResult<bool>;
    async fn create(&self, meta: &Meta, planned: Value, timeouts: &Timeouts)
        -> ProviderResult<Value>;
    async fn read(&self, meta: &Meta, state: Value) -> ProviderResult<Option<Value>>;
    async fn update(
        &self,
        meta: &Meta,
        prior: Value,
        planned: Value,
        timeouts: &Timeouts,
    ) -> ProviderResult<Value>;
    async fn delete(&self, meta: &Meta, state: Value, timeouts: &Timeouts) -> ProviderResult<()>;
    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<Value>>;
}

/// A [`DataSource`] with its state type erased.
#[async_trait::async_trait]
pub trait DynamicDataSource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> RootSchema;
    async fn read(&self, meta: &Meta, config: Value) -> ProviderResult<Value>;
}

#[async_trait::async_trait]
impl<R> DynamicResource for R
where
    R: Resource,
{
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> RootSchema {
        schema_for::<R::State>()
    }

    fn default_timeouts(&self) -> Timeouts {
        self.timeouts()
    }

    fn validate(&self, attributes: &Value) -> ProviderResult<()> {
        decode::<R::State>(R::TYPE_NAME, attributes.clone())?.validate()
    }

    fn requires_replace(&self, prior: &Value, planned: &Value) -> ProviderResult<bool> {
        let prior = decode::<R::State>(R::TYPE_NAME, prior.clone())?;
        let planned = decode::<R::State>(R::TYPE_NAME, planned.clone())?;
        Ok(Resource::requires_replace(self, &prior, &planned))
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: Value,
        timeouts: &Timeouts,
    ) -> ProviderResult<Value> {
        let planned = decode::<R::State>(R::TYPE_NAME, planned)?;
        planned.validate()?;
        encode(R::TYPE_NAME, Resource::create(self, meta, planned, timeouts).await?)
    }

    async fn read(&self, meta: &Meta, state: Value) -> ProviderResult<Option<Value>> {
        let state = decode::<R::State>(R::TYPE_NAME, state)?;
        match Resource::read(self, meta, state).await? {
            Some(state) => Ok(Some(encode(R::TYPE_NAME, state)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: Value,
        planned: Value,
        timeouts: &Timeouts,
    ) -> ProviderResult<Value> {
        let prior = decode::<R::State>(R::TYPE_NAME, prior)?;
        let planned = decode::<R::State>(R::TYPE_NAME, planned)?;
        planned.validate()?;
        encode(
            R::TYPE_NAME,
            Resource::update(self, meta, prior, planned, timeouts).await?,
        )
    }

    async fn delete(&self, meta: &Meta, state: Value, timeouts: &Timeouts) -> ProviderResult<()> {
        let state = decode::<R::State>(R::TYPE_NAME, state)?;
        Resource::delete(self, meta, state, timeouts).await
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<Value>> {
        Resource::import(self, meta, id)
            .await?
            .into_iter()
            .map(|state| encode(R::TYPE_NAME, state))
            .collect()
    }
}

#[async_trait::async_trait]
impl<D> DynamicDataSource for D
where
    D: DataSource,
{
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> RootSchema {
        schema_for::<D::State>()
    }

    async fn read(&self, meta: &Meta, config: Value) -> ProviderResult<Value> {
        let config = decode::<D::State>(D::TYPE_NAME, config)?;
        encode(D::TYPE_NAME, DataSource::read(self, meta, config).await?)
    }
}

fn decode<S: Configuration>(type_name: &str, value: Value) -> ProviderResult<S> {
    S::from_value(value).context(format!("Invalid attributes for '{}'", type_name))
}

fn encode<S: Configuration>(type_name: &str, state: S) -> ProviderResult<Value> {
    state
        .into_value()
        .context(format!("Unable to serialize attributes of '{}'", type_name))
}

fn schema_for<S: JsonSchema>() -> RootSchema {
    SchemaSettings::draft07()
        .with(|settings| settings.option_add_null_type = false)
        .into_generator()
        .into_root_schema_for::<S>()
}
