//! `core/modules` module list

use serde_json::{Value, json};
use sitekit_types::CORE_MODULES;
use wiremock::ResponseTemplate;

use crate::common::{MODULES_LIST_PATH, mount_get_once, requests_to, select_until_known, setup};

fn module_list() -> Value {
    json!([
        { "slug": "analytics-4", "name": "Analytics", "active": true, "connected": true },
        { "slug": "search-console", "name": "Search Console", "active": true, "connected": false },
        { "slug": "adsense", "name": "AdSense", "active": false, "connected": false },
    ])
}

#[tokio::test]
async fn get_modules_resolves_from_the_list_endpoint() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        MODULES_LIST_PATH,
        ResponseTemplate::new(200).set_body_json(module_list()),
    )
    .await;

    let select = site.registry.select(CORE_MODULES);
    assert_eq!(select.call("getModules", &[]).unwrap(), None);

    let modules = site
        .registry
        .until_resolved(CORE_MODULES)
        .selector("getModules", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(modules["adsense"]["name"], json!("AdSense"));
    assert_eq!(modules.as_object().unwrap().len(), 3);
    assert_eq!(requests_to(&site.server, MODULES_LIST_PATH).await, 1);
}

#[tokio::test]
async fn module_flags_come_from_the_list() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        MODULES_LIST_PATH,
        ResponseTemplate::new(200).set_body_json(module_list()),
    )
    .await;

    let args = [json!("search-console")];
    let active =
        select_until_known(&site.registry, CORE_MODULES, "isModuleActive", &args).await;
    assert_eq!(active, json!(true));

    let select = site.registry.select(CORE_MODULES);
    assert_eq!(
        select.call("isModuleConnected", &args).unwrap(),
        Some(json!(false))
    );
    assert_eq!(
        select.call("getModule", &[json!("analytics-4")]).unwrap().unwrap()["connected"],
        json!(true)
    );
    assert_eq!(requests_to(&site.server, MODULES_LIST_PATH).await, 1);
}

#[tokio::test]
async fn unknown_module_is_null_once_loaded() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        MODULES_LIST_PATH,
        ResponseTemplate::new(200).set_body_json(module_list()),
    )
    .await;

    let args = [json!("tagmanager")];
    let module = select_until_known(&site.registry, CORE_MODULES, "getModule", &args).await;
    assert_eq!(module, Value::Null);
    assert_eq!(
        site.registry
            .select(CORE_MODULES)
            .call("isModuleActive", &args)
            .unwrap(),
        Some(Value::Null)
    );
}
