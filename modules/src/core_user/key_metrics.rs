//! Key metrics slice.
//!
//! `keyMetrics` holds the user's key-metric settings once loaded (or locally
//! edited). `saveKeyMetrics` posts the current settings and replaces the
//! local copy with what the server returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sitekit_api::ApiRequest;
use sitekit_data::{
    Action, FetchStoreBuilder, RegistrationError, StoreContext, StoreDefinition, StoreError,
    StoreState, arg, arg_str, combine_stores, with_key,
};

use crate::{Method, ModuleDeps, api_control, fetch, is_loaded, loaded};

const KEY_METRICS_KEY: &str = "keyMetrics";
const IS_SAVING_KEY: &str = "isSavingKeyMetrics";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
enum KeyMetricsAction {
    #[serde(rename_all = "camelCase")]
    SetKeyMetricSetting { setting_id: String, value: Value },
    SetIsSavingKeyMetrics { saving: bool },
}

fn reduce(state: &StoreState, action: KeyMetricsAction) -> Option<StoreState> {
    match action {
        KeyMetricsAction::SetKeyMetricSetting { setting_id, value } => {
            let mut settings = state
                .get(KEY_METRICS_KEY)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            settings.insert(setting_id, value);
            Some(with_key(state, KEY_METRICS_KEY, Value::Object(settings)))
        }
        KeyMetricsAction::SetIsSavingKeyMetrics { saving } => {
            Some(with_key(state, IS_SAVING_KEY, Value::Bool(saving)))
        }
    }
}

fn replace_settings(state: &StoreState, response: &Value, _params: &Value) -> StoreState {
    with_key(state, KEY_METRICS_KEY, response.clone())
}

pub(super) fn slice(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    let request = ApiRequest::core("user", "key-metrics");

    let fetch_settings = FetchStoreBuilder::new(
        "getKeyMetricsSettings",
        api_control(&deps.api, Method::Get, request.clone()),
    )
    .reducer(replace_settings)
    .build();

    let fetch_save = FetchStoreBuilder::new(
        "saveKeyMetricsSettings",
        api_control(&deps.api, Method::Set, request),
    )
    .args_to_params(|args| json!({ "settings": arg(args, 0) }))
    .validate_params(|params| {
        if params["settings"].is_object() {
            Ok(())
        } else {
            Err("settings must be an object.".to_string())
        }
    })
    .reducer(replace_settings)
    .build();

    let slice = StoreDefinition::new()
        .state(KEY_METRICS_KEY, Value::Null)
        .state(IS_SAVING_KEY, Value::Bool(false))
        .reducer_for(reduce)
        .action("setKeyMetricSetting", |args| {
            let setting_id = arg_str(args, 0, "setKeyMetricSetting")?;
            Ok(Action::encode(&KeyMetricsAction::SetKeyMetricSetting {
                setting_id: setting_id.to_string(),
                value: arg(args, 1).clone(),
            })?)
        })
        .async_action("saveKeyMetrics", save_key_metrics)
        .selector("getKeyMetricsSettings", |ctx, _| {
            Ok(loaded(ctx.get(KEY_METRICS_KEY)))
        })
        .resolver("getKeyMetricsSettings", resolve_key_metrics_settings)
        .selector("isSavingKeyMetricsSettings", |ctx, _| {
            let saving = ctx.get(IS_SAVING_KEY).and_then(Value::as_bool).unwrap_or(false);
            Ok(Some(Value::Bool(saving)))
        });

    combine_stores([slice, fetch_settings, fetch_save])
}

async fn resolve_key_metrics_settings(
    ctx: StoreContext,
    _args: Vec<Value>,
) -> Result<(), StoreError> {
    if is_loaded(&ctx, KEY_METRICS_KEY)? {
        return Ok(());
    }
    fetch(&ctx, "fetchGetKeyMetricsSettings", &[]).await?;
    Ok(())
}

async fn save_key_metrics(ctx: StoreContext, _args: Vec<Value>) -> Result<Value, StoreError> {
    let settings = ctx
        .state()?
        .get(KEY_METRICS_KEY)
        .filter(|settings| settings.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let dispatch = ctx.dispatch();
    dispatch.apply(&Action::encode(&KeyMetricsAction::SetIsSavingKeyMetrics {
        saving: true,
    })?)?;
    let result = fetch(&ctx, "fetchSaveKeyMetricsSettings", &[settings]).await;
    dispatch.apply(&Action::encode(&KeyMetricsAction::SetIsSavingKeyMetrics {
        saving: false,
    })?)?;
    result
}
