use super::error::{self, Result};
use super::{AllowNotFound, ApiClient};
use crate::{ApiObject, ListResponse};
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::OptionExt;
use std::marker::PhantomData;

/// The state string reported for an object that no longer exists.
pub const REMOVED_STATE: &str = "removed";

/// A trait with implementations of the calls shared by every API collection.
#[async_trait::async_trait]
pub trait CrudClient: Sized + Send + Sync {
    type Object: ApiObject;

    // The following need to be implemented which allows the rest of the functions to have
    // default implementations.

    fn api_client(&self) -> &ApiClient;

    /// The collection path, e.g. `/v3/projects`.
    fn collection_path(&self) -> &str;

    fn kind(&self) -> &'static str {
        Self::Object::COLLECTION
    }

    async fn by_id(&self, id: &str) -> Result<Self::Object> {
        trace!("getting {} '{}'", self.kind(), id);
        self.api_client()
            .get(&format!("{}/{}", self.collection_path(), id))
            .await
    }

    async fn list(&self) -> Result<Vec<Self::Object>> {
        self.list_filtered(&[]).await
    }

    /// List the collection with query filters, e.g. `[("name", "system")]`.
    async fn list_filtered(&self, query: &[(&str, &str)]) -> Result<Vec<Self::Object>> {
        trace!("listing {} with {:?}", self.kind(), query);
        let list: ListResponse<Self::Object> = self
            .api_client()
            .get_with_query(self.collection_path(), query)
            .await?;
        Ok(list.data)
    }

    async fn create(&self, object: &Self::Object) -> Result<Self::Object> {
        trace!("creating {} '{}'", self.kind(), object.name());
        self.api_client().post(self.collection_path(), object).await
    }

    /// Send `update` to the object's update link.
    async fn update<B>(&self, existing: &Self::Object, update: &B) -> Result<Self::Object>
    where
        B: Serialize + Sync,
    {
        trace!("updating {} '{}'", self.kind(), existing.id());
        let url = self.object_url(existing, "update");
        self.api_client().put(&url, update).await
    }

    async fn delete(&self, existing: &Self::Object) -> Result<()> {
        trace!("deleting {} '{}'", self.kind(), existing.id());
        let url = self.object_url(existing, "remove");
        self.api_client().delete(&url).await
    }

    /// Post `body` to the named action of `existing`.
    async fn action<B, R>(&self, existing: &Self::Object, action: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        trace!(
            "calling action '{}' on {} '{}'",
            action,
            self.kind(),
            existing.id()
        );
        let url = existing
            .action_url(action)
            .context(error::MissingActionSnafu {
                kind: self.kind(),
                id: existing.id(),
                action,
            })?
            .to_string();
        self.api_client().post(&url, body).await
    }

    /// A state refresh function for the wait helper. A missing object is reported as
    /// [`REMOVED_STATE`], and an object marked as removed reports that as well.
    async fn state_refresh(&self, id: &str) -> Result<(Option<Self::Object>, String)> {
        match self.by_id(id).await.allow_not_found(|_| ())? {
            None => Ok((None, REMOVED_STATE.to_string())),
            Some(object) if object.is_removed() => Ok((Some(object), REMOVED_STATE.to_string())),
            Some(object) => {
                let state = object.state().to_string();
                Ok((Some(object), state))
            }
        }
    }

    /// The url of `link` on `existing`, falling back to `self` and then to the collection path.
    fn object_url(&self, existing: &Self::Object, link: &str) -> String {
        existing
            .link(link)
            .or_else(|| existing.link("self"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", self.collection_path(), existing.id()))
    }
}

/// A [`CrudClient`] for one API collection, either global (`/v3/{collection}`) or inside a cluster
/// (`/v3/clusters/{cluster_id}/{collection}`).
pub struct Collection<T> {
    client: ApiClient,
    path: String,
    _object: PhantomData<fn() -> T>,
}

impl<T: ApiObject> Collection<T> {
    pub fn management(client: ApiClient) -> Self {
        Self::named(client, T::COLLECTION)
    }

    /// A management collection whose name differs from `T::COLLECTION`, e.g. `clustercatalogs`.
    pub fn named(client: ApiClient, collection: &str) -> Self {
        Self {
            client,
            path: format!("/v3/{}", collection),
            _object: PhantomData,
        }
    }

    pub fn cluster_scoped(client: ApiClient, cluster_id: &str) -> Self {
        Self {
            client,
            path: format!("/v3/clusters/{}/{}", cluster_id, T::COLLECTION),
            _object: PhantomData,
        }
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _object: PhantomData,
        }
    }
}

impl<T: ApiObject> CrudClient for Collection<T> {
    type Object = T;

    fn api_client(&self) -> &ApiClient {
        &self.client
    }

    fn collection_path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::{ClientOptions, HttpStatusCode};
    use crate::types::Namespace;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(ClientOptions {
            url: server.base_url(),
            token_key: Some("token-abc:xyz".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn cluster_scoped_paths_and_links() {
        let server = MockServer::start_async().await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(200).json_body(json!({
                    "id": "foo",
                    "name": "foo",
                    "state": "active",
                    "projectId": "c-abc:p-123",
                    "links": {
                        "self": server.url("/v3/clusters/c-abc/namespaces/foo"),
                        "update": server.url("/v3/clusters/c-abc/namespaces/foo/update"),
                    },
                    "actions": {
                        "move": server.url("/v3/clusters/c-abc/namespaces/foo?action=move"),
                    }
                }));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v3/clusters/c-abc/namespaces/foo/update")
                    .json_body_partial(r#"{"description": "bar"}"#);
                then.status(200)
                    .json_body(json!({"id": "foo", "name": "foo", "description": "bar"}));
            })
            .await;
        let move_action = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/clusters/c-abc/namespaces/foo")
                    .query_param("action", "move")
                    .json_body(json!({"projectId": "c-abc:p-456"}));
                then.status(200).body("");
            })
            .await;

        let namespaces = Collection::<Namespace>::cluster_scoped(client(&server), "c-abc");
        let namespace = namespaces.by_id("foo").await.unwrap();
        assert_eq!(namespace.project_id.as_deref(), Some("c-abc:p-123"));

        let updated = namespaces
            .update(&namespace, &json!({"description": "bar"}))
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("bar"));

        let _: serde_json::Value = namespaces
            .action(&namespace, "move", &json!({"projectId": "c-abc:p-456"}))
            .await
            .unwrap();

        get.assert_async().await;
        update.assert_async().await;
        move_action.assert_async().await;
    }

    #[tokio::test]
    async fn missing_action() {
        let server = MockServer::start_async().await;
        let namespaces = Collection::<Namespace>::cluster_scoped(client(&server), "c-abc");
        let namespace: Namespace = serde_json::from_value(json!({"id": "foo"})).unwrap();
        let result: Result<serde_json::Value> =
            namespaces.action(&namespace, "move", &json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn refresh_reports_removed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/gone");
                then.status(404).json_body(json!({"code": "NotFound"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/going");
                then.status(200).json_body(json!({
                    "id": "going",
                    "state": "removing",
                    "removed": "2020-01-01T00:00:00Z"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/broken");
                then.status(500).json_body(json!({"code": "ServerError"}));
            })
            .await;

        let namespaces = Collection::<Namespace>::cluster_scoped(client(&server), "c-abc");
        let (object, state) = namespaces.state_refresh("gone").await.unwrap();
        assert!(object.is_none());
        assert_eq!(state, REMOVED_STATE);

        let (object, state) = namespaces.state_refresh("going").await.unwrap();
        assert!(object.is_some());
        assert_eq!(state, REMOVED_STATE);

        let err = namespaces.state_refresh("broken").await.unwrap_err();
        assert!(err.is_status_code(http::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn list_with_filter() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/clusters/c-abc/namespaces")
                    .query_param("name", "foo");
                then.status(200)
                    .json_body(json!({"type": "collection", "data": [{"id": "foo"}]}));
            })
            .await;
        let namespaces = Collection::<Namespace>::cluster_scoped(client(&server), "c-abc");
        let found = namespaces.list_filtered(&[("name", "foo")]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "foo");
        list.assert_async().await;
    }
}
