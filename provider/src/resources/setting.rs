use super::require;
use crate::error::ProviderResult;
use crate::meta::Meta;
use crate::resource::DataSource;
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SettingState {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Computed.
    #[serde(default)]
    pub value: String,
}

impl Configuration for SettingState {}

/// Looks up the value of a server setting.
pub struct SettingDataSource;

#[async_trait::async_trait]
impl DataSource for SettingDataSource {
    type State = SettingState;

    const TYPE_NAME: &'static str = "rancher2_setting";

    async fn read(&self, meta: &Meta, config: SettingState) -> ProviderResult<SettingState> {
        require("name", &config.name)?;
        let value = meta.get_setting_value(&config.name).await?;
        Ok(SettingState {
            id: config.name.clone(),
            name: config.name,
            value,
        })
    }
}
