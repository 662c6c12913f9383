use std::net::SocketAddr;
use std::path::PathBuf;

use configs::{AppConfig, BackendKind};
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use server::startup;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use uuid::Uuid;

struct TestApp {
    base_url: String,
    data_file: PathBuf,
    _stop: oneshot::Sender<()>,
}

async fn start_server() -> anyhow::Result<TestApp> {
    // isolated data file per test
    let data_file = std::env::temp_dir()
        .join(format!("food_e2e_{}", Uuid::new_v4()))
        .join("jsonfood.json");
    let mut cfg = AppConfig::default();
    cfg.storage.backend = BackendKind::File;
    cfg.storage.file.path = data_file.clone();

    let state = startup::build_state(&cfg).await?;
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let (stop, stopped) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async {
            let _ = stopped.await;
        };
        if let Err(e) = startup::serve(listener, state, shutdown).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url: format!("http://{}/api/food", addr), data_file, _stop: stop })
}

fn rice() -> Value {
    json!({"product": "rice", "amount": 5, "price": 100, "shop": "A", "todate": "2025-01-01"})
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let health = app.base_url.replace("/api/food", "/health");
    let res = reqwest::get(health).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_create_then_list_and_persist() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();

    let res = c.get(&app.base_url).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!([]));

    let res = c.post(&app.base_url).json(&rice()).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["item"]["id"], 1);
    assert_eq!(body["item"]["product"], "rice");

    let res = c.post(&app.base_url).json(&rice()).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], true);

    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&app.data_file).await?)?;
    assert_eq!(on_disk.as_array().map(Vec::len), Some(1));
    assert_eq!(on_disk[0]["id"], 1);
    Ok(())
}

#[tokio::test]
async fn e2e_filters_update_and_delete() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();
    c.post(&app.base_url).json(&rice()).send().await?;
    let mut beans = rice();
    beans["product"] = json!("beans");
    beans["shop"] = json!("B");
    c.post(&app.base_url).json(&beans).send().await?;

    let res = c.get(format!("{}?shop=B", app.base_url)).send().await?;
    let listed = res.json::<Value>().await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], 2);

    let res = c.patch(format!("{}?id=2", app.base_url)).json(&json!({"price": 999})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let item = res.json::<Value>().await?["item"].clone();
    assert_eq!(item, json!({"id": 2, "product": "beans", "amount": 5, "price": 999, "shop": "B", "todate": "2025-01-01"}));

    // id in the body works when the query has none
    let mut full = beans.clone();
    full["id"] = json!(2);
    full["amount"] = json!(7.5);
    let res = c.put(&app.base_url).json(&full).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["item"]["amount"], 7.5);

    let res = c.delete(format!("{}?id=1", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["item"]["product"], "rice");

    let all = c.get(&app.base_url).send().await?.json::<Value>().await?;
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    assert_eq!(all[0]["id"], 2);
    Ok(())
}

#[tokio::test]
async fn e2e_query_id_wins_over_body_id() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();
    c.post(&app.base_url).json(&rice()).send().await?;
    let mut tea = rice();
    tea["product"] = json!("tea");
    c.post(&app.base_url).json(&tea).send().await?;

    let res = c
        .patch(format!("{}?id=1", app.base_url))
        .json(&json!({"id": 2, "shop": "Z"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let item = res.json::<Value>().await?["item"].clone();
    assert_eq!(item["id"], 1);
    assert_eq!(item["shop"], "Z");

    let mut full = rice();
    full["id"] = json!(2);
    full["price"] = json!(42);
    let res = c.put(format!("{}?id=1", app.base_url)).json(&full).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["item"]["id"], 1);

    let all = c.get(&app.base_url).send().await?.json::<Value>().await?;
    assert_eq!(all[0]["price"], 42);
    assert_eq!(all[1], json!({"id": 2, "product": "tea", "amount": 5, "price": 100, "shop": "A", "todate": "2025-01-01"}));
    Ok(())
}

#[tokio::test]
async fn e2e_error_statuses() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();

    let res = c.post(&app.base_url).json(&json!({"product": "rice"})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "missing required fields: amount, price, shop, todate");

    let res = c.delete(&app.base_url).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["message"], "id is required");

    let res = c.delete(format!("{}?id=42", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);

    let res = c
        .post(&app.base_url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "invalid JSON body");
    assert!(body["detail"].is_string());
    Ok(())
}

#[tokio::test]
async fn e2e_metrics_count_operations() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();
    c.post(&app.base_url).json(&rice()).send().await?;

    let metrics_url = app.base_url.replace("/api/food", "/metrics");
    let text = c.get(metrics_url).send().await?.text().await?;
    assert!(text.contains("food_store_requests_total"));
    assert!(text.contains(r#"operation="create""#));
    Ok(())
}
