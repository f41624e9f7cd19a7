/*!

References between resources. A string value that is exactly `${type.name.attribute}` is replaced
with that attribute of the addressed resource (from the state) or data source (read on first
use). References anywhere else in a string are left alone.

!*/

use super::error::{self, Result};
use super::manifest::Manifest;
use super::state::StateFile;
use crate::meta::Meta;
use crate::resources::Registry;
use async_recursion::async_recursion;
use regex::Regex;
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet};

const TEMPLATE_PATTERN_REGEX: &str = r"^\$\{([^.}]+\.[^.}]+)\.([^.}]+)\}$";

lazy_static::lazy_static! {
    static ref REGEX: Regex = {
        #[allow(clippy::unwrap_used)]
        Regex::new(TEMPLATE_PATTERN_REGEX).unwrap()
    };
}

/// The address and attribute of a reference, if `input` is one.
pub(crate) fn parse_reference(input: &str) -> Option<(&str, &str)> {
    let captures = REGEX.captures(input)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// Every address referenced in `value`.
pub(crate) fn references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_references(value, &mut found);
    found
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if let Some((address, _)) = parse_reference(s) {
                found.insert(address.to_string());
            }
        }
        Value::Array(values) => values
            .iter()
            .for_each(|value| collect_references(value, found)),
        Value::Object(map) => map
            .values()
            .for_each(|value| collect_references(value, found)),
        _ => {}
    }
}

/// A config with its references replaced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
    pub value: Value,
    /// Some reference points at a resource that has not been created yet. Those references are
    /// left in `value` as written.
    pub unknown: bool,
}

/// Resolves references for one run. Data sources are read at most once.
pub(crate) struct Resolver<'a> {
    meta: &'a Meta,
    registry: &'a Registry,
    manifest: &'a Manifest,
    data: BTreeMap<String, Value>,
    reading: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(meta: &'a Meta, registry: &'a Registry, manifest: &'a Manifest) -> Self {
        Self {
            meta,
            registry,
            manifest,
            data: BTreeMap::new(),
            reading: BTreeSet::new(),
        }
    }

    /// Resolve the config of the resource or data source at `address`.
    pub(crate) async fn resolve(
        &mut self,
        address: &str,
        state: &StateFile,
        config: Value,
    ) -> Result<Resolved> {
        let mut unknown = false;
        let value = self.resolve_value(address, state, config, &mut unknown).await?;
        Ok(Resolved { value, unknown })
    }

    #[async_recursion]
    async fn resolve_value(
        &mut self,
        address: &str,
        state: &StateFile,
        input: Value,
        unknown: &mut bool,
    ) -> Result<Value> {
        match input {
            Value::String(input_string) => {
                self.resolve_string(address, state, input_string, unknown)
                    .await
            }
            Value::Array(values) => {
                let mut resolved = Vec::with_capacity(values.len());
                for value in values {
                    resolved.push(self.resolve_value(address, state, value, unknown).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = Map::new();
                for (key, value) in map {
                    let value = self.resolve_value(address, state, value, unknown).await?;
                    resolved.insert(key, value);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other),
        }
    }

    async fn resolve_string(
        &mut self,
        address: &str,
        state: &StateFile,
        input: String,
        unknown: &mut bool,
    ) -> Result<Value> {
        let (target, attribute) = match parse_reference(&input) {
            Some((target, attribute)) => (target.to_string(), attribute.to_string()),
            None => return Ok(Value::String(input)),
        };

        let attributes = if let Some(record) = state.get(&target) {
            record.attributes.clone()
        } else if self.manifest.resource(&target).is_some() {
            *unknown = true;
            return Ok(Value::String(input));
        } else if self.manifest.data_source(&target).is_some() {
            self.read_data(&target, state).await?
        } else {
            return error::TemplateSnafu {
                address,
                what: format!("reference to unknown resource '{}'", target),
            }
            .fail();
        };

        attributes
            .get(&attribute)
            .cloned()
            .context(error::TemplateSnafu {
                address,
                what: format!("'{}' has no attribute '{}'", target, attribute),
            })
    }

    async fn read_data(&mut self, target: &str, state: &StateFile) -> Result<Value> {
        if let Some(value) = self.data.get(target) {
            return Ok(value.clone());
        }
        if !self.reading.insert(target.to_string()) {
            return error::DependencyCycleSnafu {
                addresses: self.reading.iter().cloned().collect::<Vec<_>>(),
            }
            .fail();
        }

        let read = self.read_data_uncached(target, state).await;
        self.reading.remove(target);
        let value = read?;
        self.data.insert(target.to_string(), value.clone());
        Ok(value)
    }

    async fn read_data_uncached(&mut self, target: &str, state: &StateFile) -> Result<Value> {
        let block = self
            .manifest
            .data_source(target)
            .context(error::NotFoundSnafu {
                what: format!("data source '{}'", target),
            })?;
        let mut unknown = false;
        let config = self
            .resolve_value(target, state, block.config.clone(), &mut unknown)
            .await?;
        if unknown {
            return error::TemplateSnafu {
                address: target,
                what: "data sources can not refer to resources that do not exist yet",
            }
            .fail();
        }
        let data_source = self
            .registry
            .data_source(&block.data_type)
            .context(error::ProviderSnafu {
                action: "find data source",
                address: target,
            })?;
        data_source
            .read(self.meta, config)
            .await
            .context(error::ProviderSnafu {
                action: "read",
                address: target,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::manager::manifest::convert_manifest;
    use crate::manager::state::ResourceRecord;
    use serde_json::json;

    #[test]
    fn pattern() {
        assert_eq!(
            parse_reference("${rancher2_project.web.id}"),
            Some(("rancher2_project.web", "id"))
        );
        assert!(parse_reference("rancher2_project.web.id").is_none());
        assert!(parse_reference("${rancher2_project.id}").is_none());
        assert!(parse_reference("foo${rancher2_project.web.id}").is_none());
        assert!(parse_reference("${rancher2_project.web.id}bar").is_none());
        assert!(parse_reference("${.web.id}").is_none());
        assert!(parse_reference("${a.b.c.d}").is_none());
    }

    #[test]
    fn collects_nested_references() {
        let value = json!({
            "project_id": "${rancher2_project.web.id}",
            "labels": {"owner": "${rancher2_setting.owner.value}"},
            "servers": ["${rancher2_project.web.name}", "plain"],
        });
        let found: Vec<_> = references(&value).into_iter().collect();
        assert_eq!(found, vec!["rancher2_project.web", "rancher2_setting.owner"]);
    }

    fn meta() -> Meta {
        Meta::new(ProviderConfig {
            api_url: Some("https://rancher.example.com".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    const MANIFEST: &str = r#"
resources:
  - type: rancher2_project
    name: web
    config: {cluster_id: c-abc12, name: web}
  - type: rancher2_project
    name: api
    config: {cluster_id: c-abc12, name: api}
"#;

    #[tokio::test]
    async fn resolves_from_state() {
        let manifest = convert_manifest(MANIFEST).unwrap();
        let mut state = StateFile::default();
        state.insert(
            "rancher2_project.web".to_string(),
            ResourceRecord {
                resource_type: "rancher2_project".to_string(),
                name: "web".to_string(),
                id: "c-abc12:p-web".to_string(),
                attributes: json!({"id": "c-abc12:p-web", "name": "web"}),
                depends_on: vec![],
            },
        );
        let meta = meta();
        let registry = Registry::new();
        let mut resolver = Resolver::new(&meta, &registry, &manifest);

        let resolved = resolver
            .resolve(
                "rancher2_namespace.frontend",
                &state,
                json!({"project_id": "${rancher2_project.web.id}"}),
            )
            .await
            .unwrap();
        assert_eq!(resolved.value, json!({"project_id": "c-abc12:p-web"}));
        assert!(!resolved.unknown);

        let resolved = resolver
            .resolve(
                "rancher2_namespace.backend",
                &state,
                json!({"project_id": "${rancher2_project.api.id}"}),
            )
            .await
            .unwrap();
        assert!(resolved.unknown);
        assert_eq!(resolved.value["project_id"], "${rancher2_project.api.id}");

        let err = resolver
            .resolve(
                "rancher2_namespace.frontend",
                &state,
                json!({"project_id": "${rancher2_project.web.uuid}"}),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "In 'rancher2_namespace.frontend': 'rancher2_project.web' has no attribute 'uuid'"
        );

        assert!(resolver
            .resolve("x.y", &state, json!("${rancher2_project.nope.id}"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn failed_data_read_can_be_retried() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let setting = server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/settings/server-url");
                then.status(500);
            })
            .await;
        let manifest = convert_manifest(
            r#"
data:
  - type: rancher2_setting
    name: url
    config: {name: server-url}
"#,
        )
        .unwrap();
        let meta = crate::resources::test::test_meta(&server);
        let registry = Registry::new();
        let mut resolver = Resolver::new(&meta, &registry, &manifest);
        let state = StateFile::default();

        for _ in 0..2 {
            let err = resolver
                .resolve("x.y", &state, json!("${rancher2_setting.url.value}"))
                .await
                .unwrap_err();
            assert!(
                err.to_string().starts_with("Unable to read 'rancher2_setting.url'"),
                "{}",
                err
            );
        }
        setting.assert_hits_async(2).await;
    }
}
