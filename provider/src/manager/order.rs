use super::error::{self, Result};
use super::manifest::Manifest;
use super::templates::references;
use snafu::ensure;
use std::collections::{BTreeMap, BTreeSet};
use topological_sort::TopologicalSort;

/// The resources each resource of `manifest` depends on, through `depends_on` or references.
/// A reference to a data source counts as a dependency on whatever the data source refers to.
pub(crate) fn manifest_dependencies(
    manifest: &Manifest,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut dependencies = BTreeMap::new();
    for block in &manifest.resources {
        let address = block.address();
        for dependency in &block.depends_on {
            ensure!(
                manifest.resource(dependency).is_some()
                    || manifest.data_source(dependency).is_some(),
                error::TemplateSnafu {
                    address: &address,
                    what: format!("depends_on refers to unknown address '{}'", dependency),
                }
            );
        }

        let mut pending: Vec<String> = block
            .depends_on
            .iter()
            .cloned()
            .chain(references(&block.config))
            .collect();
        let mut seen = BTreeSet::new();
        let mut needs = BTreeSet::new();
        while let Some(dependency) = pending.pop() {
            if !seen.insert(dependency.clone()) {
                continue;
            }
            match manifest.data_source(&dependency) {
                Some(data) => pending.extend(references(&data.config)),
                None => {
                    needs.insert(dependency);
                }
            }
        }
        dependencies.insert(address, needs);
    }
    Ok(dependencies)
}

/// Order the keys of `dependencies` so that every address comes after the addresses it depends
/// on. Dependencies that are not keys themselves are ignored. Addresses that become ready at the
/// same time keep their alphabetical order.
pub(crate) fn creation_order(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>> {
    let mut topo_sort = TopologicalSort::<String>::new();
    for (address, needs) in dependencies {
        topo_sort.insert(address.clone());
        for dependency in needs
            .iter()
            .filter(|dependency| dependencies.contains_key(*dependency))
        {
            topo_sort.add_dependency(dependency.clone(), address.clone());
        }
    }

    let mut order = Vec::with_capacity(dependencies.len());
    while !topo_sort.is_empty() {
        let mut ready = topo_sort.pop_all();
        if ready.is_empty() {
            let placed: BTreeSet<&String> = order.iter().collect();
            return error::DependencyCycleSnafu {
                addresses: dependencies
                    .keys()
                    .filter(|address| !placed.contains(address))
                    .cloned()
                    .collect::<Vec<_>>(),
            }
            .fail();
        }
        ready.sort();
        order.extend(ready);
    }
    Ok(order)
}

/// The reverse of [`creation_order`].
pub(crate) fn destruction_order(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>> {
    let mut order = creation_order(dependencies)?;
    order.reverse();
    Ok(order)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manager::manifest::convert_manifest;
    use crate::manager::Error;
    use maplit::{btreemap, btreeset};

    #[test]
    fn dependencies_through_data_sources() {
        let manifest = convert_manifest(
            r#"
resources:
  - type: rancher2_cluster
    name: main
    config: {name: main}
  - type: rancher2_project
    name: web
    config:
      name: web
      cluster_id: ${rancher2_setting.cluster.value}
  - type: rancher2_namespace
    name: frontend
    config: {name: frontend}
    depends_on: [rancher2_project.web]
data:
  - type: rancher2_setting
    name: cluster
    config:
      name: ${rancher2_cluster.main.name}
"#,
        )
        .unwrap();
        assert_eq!(
            manifest_dependencies(&manifest).unwrap(),
            btreemap! {
                "rancher2_cluster.main".to_string() => btreeset! {},
                "rancher2_project.web".to_string() => btreeset! {
                    "rancher2_cluster.main".to_string(),
                },
                "rancher2_namespace.frontend".to_string() => btreeset! {
                    "rancher2_project.web".to_string(),
                },
            }
        );
    }

    #[test]
    fn unknown_depends_on() {
        let manifest = convert_manifest(
            r#"
resources:
  - type: rancher2_namespace
    name: frontend
    config: {name: frontend}
    depends_on: [rancher2_project.web]
"#,
        )
        .unwrap();
        assert_eq!(
            manifest_dependencies(&manifest).unwrap_err().to_string(),
            "In 'rancher2_namespace.frontend': depends_on refers to unknown address \
             'rancher2_project.web'"
        );
    }

    fn graph() -> BTreeMap<String, BTreeSet<String>> {
        btreemap! {
            "rancher2_namespace.frontend".to_string() => btreeset! {
                "rancher2_project.web".to_string(),
            },
            "rancher2_project.web".to_string() => btreeset! {
                "rancher2_cluster.main".to_string(),
            },
            "rancher2_cluster.main".to_string() => btreeset! {},
            "rancher2_catalog.charts".to_string() => btreeset! {
                "rancher2_setting.url".to_string(),
            },
        }
    }

    #[test]
    fn dependencies_first() {
        assert_eq!(
            creation_order(&graph()).unwrap(),
            vec![
                "rancher2_catalog.charts",
                "rancher2_cluster.main",
                "rancher2_project.web",
                "rancher2_namespace.frontend",
            ]
        );
        assert_eq!(
            destruction_order(&graph()).unwrap(),
            vec![
                "rancher2_namespace.frontend",
                "rancher2_project.web",
                "rancher2_cluster.main",
                "rancher2_catalog.charts",
            ]
        );
    }

    #[test]
    fn cycle() {
        let mut graph = graph();
        graph.insert(
            "rancher2_cluster.main".to_string(),
            btreeset! {"rancher2_namespace.frontend".to_string()},
        );
        match creation_order(&graph).unwrap_err() {
            Error::DependencyCycle { addresses } => assert_eq!(
                addresses,
                vec![
                    "rancher2_cluster.main",
                    "rancher2_namespace.frontend",
                    "rancher2_project.web",
                ]
            ),
            other => panic!("unexpected error: {}", other),
        }
    }
}
