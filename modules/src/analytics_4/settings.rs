//! Module settings slice.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sitekit_api::ApiRequest;
use sitekit_data::{
    Action, FetchStoreBuilder, RegistrationError, StoreContext, StoreDefinition, StoreError,
    StoreState, arg, combine_stores, with_key,
};

use super::SLUG;
use crate::{Method, ModuleDeps, api_control, fetch, is_loaded, loaded};

const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
enum SettingsAction {
    SetSetting { name: String, value: Value },
}

fn reduce(state: &StoreState, action: SettingsAction) -> Option<StoreState> {
    match action {
        SettingsAction::SetSetting { name, value } => {
            let mut settings = state
                .get(SETTINGS_KEY)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            settings.insert(name, value);
            Some(with_key(state, SETTINGS_KEY, Value::Object(settings)))
        }
    }
}

fn replace_settings(state: &StoreState, response: &Value, _params: &Value) -> StoreState {
    with_key(state, SETTINGS_KEY, response.clone())
}

pub(super) fn slice(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    let request = ApiRequest::modules(SLUG, "settings");

    let fetch_settings = FetchStoreBuilder::new(
        "getSettings",
        api_control(&deps.api, Method::Get, request.clone()),
    )
    .reducer(replace_settings)
    .build();

    let fetch_save = FetchStoreBuilder::new(
        "saveSettings",
        api_control(&deps.api, Method::Set, request),
    )
    .args_to_params(|args| arg(args, 0).clone())
    .validate_params(|params| {
        if params.is_object() {
            Ok(())
        } else {
            Err("settings must be an object.".to_string())
        }
    })
    .reducer(replace_settings)
    .build();

    let slice = StoreDefinition::new()
        .state(SETTINGS_KEY, Value::Null)
        .reducer_for(reduce)
        .selector("getSettings", |ctx, _| Ok(loaded(ctx.get(SETTINGS_KEY))))
        .resolver("getSettings", resolve_settings)
        .selector("getPropertyID", |ctx, _| {
            Ok(ctx
                .select("getSettings", &[])?
                .map(|settings| settings.get("propertyID").cloned().unwrap_or(Value::Null)))
        })
        .action("setPropertyID", |args| {
            Ok(Action::encode(&SettingsAction::SetSetting {
                name: "propertyID".to_string(),
                value: arg(args, 0).clone(),
            })?)
        })
        .async_action("saveSettings", save_settings);

    combine_stores([slice, fetch_settings, fetch_save])
}

async fn resolve_settings(ctx: StoreContext, _args: Vec<Value>) -> Result<(), StoreError> {
    if is_loaded(&ctx, SETTINGS_KEY)? {
        return Ok(());
    }
    fetch(&ctx, "fetchGetSettings", &[]).await?;
    Ok(())
}

async fn save_settings(ctx: StoreContext, _args: Vec<Value>) -> Result<Value, StoreError> {
    let values = ctx
        .state()?
        .get(SETTINGS_KEY)
        .filter(|settings| settings.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    fetch(&ctx, "fetchSaveSettings", &[values]).await
}
