//! `core/modules`: the site's module list.

use serde_json::{Map, Value};
use sitekit_api::ApiRequest;
use sitekit_data::{
    FetchStoreBuilder, RegistrationError, SelectorContext, StoreContext, StoreDefinition,
    StoreError, arg_str, combine_stores, error_store, with_key,
};

use crate::{Method, ModuleDeps, api_control, fetch, is_loaded, loaded};

const MODULES_KEY: &str = "modules";

pub(crate) fn store(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    let fetch_modules = FetchStoreBuilder::new(
        "getModules",
        api_control(&deps.api, Method::Get, ApiRequest::core("modules", "list")),
    )
    .reducer(|state, response, _| with_key(state, MODULES_KEY, modules_by_slug(response)))
    .build();

    let slice = StoreDefinition::new()
        .state(MODULES_KEY, Value::Null)
        .selector("getModules", |ctx, _| Ok(loaded(ctx.get(MODULES_KEY))))
        .resolver("getModules", resolve_modules)
        .selector("getModule", |ctx, args| {
            let slug = arg_str(args, 0, "getModule")?;
            module(ctx, slug)
        })
        .selector("isModuleActive", |ctx, args| {
            let slug = arg_str(args, 0, "isModuleActive")?;
            module_flag(ctx, slug, "active")
        })
        .selector("isModuleConnected", |ctx, args| {
            let slug = arg_str(args, 0, "isModuleConnected")?;
            module_flag(ctx, slug, "connected")
        });

    combine_stores([slice, fetch_modules, error_store()])
}

async fn resolve_modules(ctx: StoreContext, _args: Vec<Value>) -> Result<(), StoreError> {
    if is_loaded(&ctx, MODULES_KEY)? {
        return Ok(());
    }
    fetch(&ctx, "fetchGetModules", &[]).await?;
    Ok(())
}

/// The list endpoint returns an array; state keeps it keyed by slug.
fn modules_by_slug(response: &Value) -> Value {
    match response {
        Value::Array(list) => {
            let by_slug: Map<String, Value> = list
                .iter()
                .filter_map(|module| {
                    let slug = module.get("slug")?.as_str()?;
                    Some((slug.to_string(), module.clone()))
                })
                .collect();
            Value::Object(by_slug)
        }
        Value::Object(_) => response.clone(),
        _ => Value::Object(Map::new()),
    }
}

/// `None` while the list is unresolved, `Some(null)` for an unknown slug.
fn module(ctx: &SelectorContext<'_>, slug: &str) -> Result<Option<Value>, StoreError> {
    let Some(modules) = ctx.select("getModules", &[])? else {
        return Ok(None);
    };
    Ok(Some(modules.get(slug).cloned().unwrap_or(Value::Null)))
}

fn module_flag(ctx: &SelectorContext<'_>, slug: &str, flag: &str) -> Result<Option<Value>, StoreError> {
    Ok(module(ctx, slug)?.map(|module| {
        if module.is_null() {
            Value::Null
        } else {
            Value::Bool(module.get(flag).and_then(Value::as_bool).unwrap_or(false))
        }
    }))
}
