//! Properties slice: GA4 properties addressed by ID.

use serde_json::{Value, json};
use sitekit_api::ApiRequest;
use sitekit_data::{
    FetchStoreBuilder, RegistrationError, StoreContext, StoreDefinition, StoreError, StoreState,
    arg, arg_str, combine_stores, with_key,
};

use super::SLUG;
use crate::{Method, ModuleDeps, api_control, fetch};

const PROPERTIES_KEY: &str = "propertiesByID";

fn receive_property(state: &StoreState, property: &Value, params: &Value) -> StoreState {
    let Some(id) = params.get("propertyID").and_then(Value::as_str) else {
        return state.clone();
    };
    let mut properties = state
        .get(PROPERTIES_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    properties.insert(id.to_string(), property.clone());
    with_key(state, PROPERTIES_KEY, Value::Object(properties))
}

fn property_in(state: &StoreState, id: &str) -> Option<Value> {
    state.get(PROPERTIES_KEY)?.get(id).cloned()
}

pub(super) fn slice(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    let fetch_property = FetchStoreBuilder::new(
        "getProperty",
        api_control(&deps.api, Method::Get, ApiRequest::modules(SLUG, "property")),
    )
    .args_to_params(|args| json!({ "propertyID": arg(args, 0) }))
    .validate_params(|params| {
        if params["propertyID"].is_string() {
            Ok(())
        } else {
            Err("propertyID must be a string.".to_string())
        }
    })
    .reducer(receive_property)
    .build();

    let slice = StoreDefinition::new()
        .state(PROPERTIES_KEY, json!({}))
        .selector("getProperty", |ctx, args| {
            let id = arg_str(args, 0, "getProperty")?;
            Ok(property_in(ctx.state(), id))
        })
        .resolver("getProperty", resolve_property);

    combine_stores([slice, fetch_property])
}

async fn resolve_property(ctx: StoreContext, args: Vec<Value>) -> Result<(), StoreError> {
    let id = arg_str(&args, 0, "getProperty")?;
    let state = ctx.state()?;
    if property_in(&state, id).is_some() {
        return Ok(());
    }
    fetch(&ctx, "fetchGetProperty", &args[..1]).await?;
    Ok(())
}
