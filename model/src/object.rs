use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// The common fields carried by every v3 API object.
///
/// Read-only fields (`links`, `actions`, `state`, ...) are never sent back to the server because
/// they are skipped when empty and the server ignores them when present.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitioning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitioning_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing)]
    pub links: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing)]
    pub actions: Option<BTreeMap<String, String>>,
}

impl ObjectMeta {
    /// Create metadata for a new object with the given name, annotations and labels.
    pub fn new<S: Into<String>>(
        name: S,
        annotations: BTreeMap<String, String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            annotations: Some(annotations),
            labels: Some(labels),
            ..Default::default()
        }
    }
}

/// An object that lives in a v3 API collection.
pub trait ApiObject: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// The lower-case collection name, e.g. `projectroletemplatebindings`.
    const COLLECTION: &'static str;

    fn meta(&self) -> &ObjectMeta;

    fn id(&self) -> &str {
        self.meta().id.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// The lifecycle state reported by the server, e.g. `active` or `removing`.
    fn state(&self) -> &str {
        self.meta().state.as_deref().unwrap_or_default()
    }

    fn is_removed(&self) -> bool {
        self.meta()
            .removed
            .as_deref()
            .map(|removed| !removed.is_empty())
            .unwrap_or_default()
    }

    fn link(&self, name: &str) -> Option<&str> {
        self.meta()
            .links
            .as_ref()
            .and_then(|links| links.get(name))
            .map(String::as_str)
    }

    fn action_url(&self, name: &str) -> Option<&str> {
        self.meta()
            .actions
            .as_ref()
            .and_then(|actions| actions.get(name))
            .map(String::as_str)
    }

    fn annotations(&self) -> BTreeMap<String, String> {
        self.meta().annotations.clone().unwrap_or_default()
    }

    fn labels(&self) -> BTreeMap<String, String> {
        self.meta().labels.clone().unwrap_or_default()
    }
}

/// Implements `ApiObject` for a type with a flattened `meta: ObjectMeta` field.
#[macro_export]
macro_rules! impl_api_object {
    ($t:ty, $collection:expr) => {
        impl $crate::ApiObject for $t {
            const COLLECTION: &'static str = $collection;

            fn meta(&self) -> &$crate::ObjectMeta {
                &self.meta
            }
        }
    };
}

/// The envelope the API wraps around collection listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}
