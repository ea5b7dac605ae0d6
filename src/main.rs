#![forbid(unsafe_code)]

use std::sync::Arc;

use lazy_static::lazy_static;
use log::{info, warn};
use poem::endpoint::StaticFilesEndpoint;
use poem::{get, listener::TcpListener, Endpoint, EndpointExt, Route};
use poem_openapi::OpenApiService;

// Userdir Utilities
use crate::v1::users::users_delete::DeleteUserApi;
use crate::v1::users::users_get::GetUserApi;
use crate::v1::users::users_list::ListUsersApi;
use crate::v1::users::users_update::UpdateUserApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, USERDIR_ARGS, USERDIR_DIRS};
use crate::utils::errors::Errors;
use crate::utils::user_store::UserRecordStore;
use crate::views::Views;

// Modules
mod utils;
mod v1;
mod views;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "UserdirServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Userdir -------------
    // Announce ourselves.
    println!("Starting userdir_server!");

    // Creating the directories is all that's asked of us.
    if USERDIR_ARGS.create_dirs_only {
        println!("Data directories are rooted at {}.", USERDIR_DIRS.root_dir);
        return Ok(());
    }

    // Initialize the server.
    let store = userdir_init();
    let views = match Views::new(&RUNTIME_CTX.parms.config.title) {
        Ok(v) => Arc::new(v),
        Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
    };

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let api_url = format!("{}:{}{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port,
        "/v1");
    let app = make_app(store, views, &USERDIR_DIRS.static_dir, &api_url);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// userdir_init:
// ---------------------------------------------------------------------------
/** Initialize logging and the runtime context, and open the record store. */
fn userdir_init() -> Arc<UserRecordStore> {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();

    // Report what the store will serve.
    let store = UserRecordStore::new(RUNTIME_CTX.users_dir());
    match store.list_usernames() {
        Ok(names) => info!("Serving {} user record(s) from {}.", names.len(), store.base_dir().display()),
        Err(e) => warn!("Unable to list user records: {}", e),
    }
    Arc::new(store)
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running USERDIR={}", option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"));
}

// ---------------------------------------------------------------------------
// make_app:
// ---------------------------------------------------------------------------
/** Assemble every route.  The HTML pages own the root and /:username, the
 * OpenAPI service lives under /v1, and the remaining top-level names are
 * taken by the OpenAPI document, docs and static endpoints.
 */
fn make_app(store: Arc<UserRecordStore>, views: Arc<Views>, static_dir: &str, api_url: &str) -> impl Endpoint {
    let endpoints = (ListUsersApi, GetUserApi, UpdateUserApi, DeleteUserApi);
    let api_service =
        OpenApiService::new(endpoints, "User Directory", env!("CARGO_PKG_VERSION")).server(api_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .at("/", get(views::index))
        .at("/:username", get(views::show).put(views::update).delete(views::remove))
        .nest("/v1", api_service)
        .nest("/docs", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .nest("/static", StaticFilesEndpoint::new(static_dir))
        .data(store)
        .data(views)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use std::fs;
    use tempfile::TempDir;

    const ALICE: &str =
        r#"{"username":"alice","name":{"first":"alice","last":"smith"},"location":{"city":"nyc"}}"#;
    const BOB: &str =
        r#"{"username":"bob","name":{"first":"BOB","last":"jones"},"location":{"street":"1 main st","city":"austin"}}"#;

    fn test_client(files: &[(&str, &str)]) -> (TempDir, TestClient<impl Endpoint>) {
        let dir = tempfile::tempdir().unwrap();
        let users_dir = dir.path().join("users");
        let static_dir = dir.path().join("static");
        fs::create_dir(&users_dir).unwrap();
        fs::create_dir(&static_dir).unwrap();
        fs::write(static_dir.join("style.css"), "body {}").unwrap();
        for (name, contents) in files {
            fs::write(users_dir.join(name), contents).unwrap();
        }

        let store = Arc::new(UserRecordStore::new(&users_dir));
        let views = Arc::new(Views::new("Directory").unwrap());
        let app = make_app(store, views, static_dir.to_str().unwrap(), "http://localhost:3000/v1");
        (dir, TestClient::new(app))
    }

    async fn body_string(resp: poem::test::TestResponse) -> String {
        resp.0.into_body().into_string().await.unwrap()
    }

    // ----------------------------- JSON API -------------------------------
    #[tokio::test]
    async fn api_get_user() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE)]);
        let resp = cli.get("/v1/users/alice").send().await;
        resp.assert_status_is_ok();

        let json = resp.json().await;
        let obj = json.value().object();
        obj.get("result_code").assert_string("0");
        let user = obj.get("user").object();
        user.get("username").assert_string("alice");
        user.get("name").object().get("full").assert_string("Alice Smith");
        user.get("location").object().get("city").assert_string("Nyc");
    }

    #[tokio::test]
    async fn api_get_missing_user() {
        let (_dir, cli) = test_client(&[]);
        let resp = cli.get("/v1/users/nobody").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.json().await.value().object().get("result_code").assert_string("404");
    }

    #[tokio::test]
    async fn api_get_corrupt_user() {
        let (_dir, cli) = test_client(&[("carl.json", "{\"username\":")]);
        let resp = cli.get("/v1/users/carl").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn api_list_users() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE), ("bob.json", BOB)]);
        let resp = cli.get("/v1/users").send().await;
        resp.assert_status_is_ok();

        let json = resp.json().await;
        let obj = json.value().object();
        obj.get("num_users").assert_i64(2);
        let users = obj.get("users").object_array();
        users[0].get("username").assert_string("alice");
        users[1].get("name").object().get("full").assert_string("Bob Jones");
        users[1].get("location").object().get("street").assert_string("1 Main St");
    }

    #[tokio::test]
    async fn api_list_fails_on_corrupt_record() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE), ("broken.json", "[]")]);
        let resp = cli.get("/v1/users").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn api_update_then_get() {
        let (dir, cli) = test_client(&[("alice.json", ALICE)]);
        let resp = cli.put("/v1/users/alice")
            .body_json(&serde_json::json!({"city": "boston", "street": "9 elm st"}))
            .send()
            .await;
        resp.assert_status_is_ok();

        let resp = cli.get("/v1/users/alice").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let user = json.value().object().get("user").object();
        user.get("location").object().get("city").assert_string("Boston");
        user.get("location").object().get("street").assert_string("9 Elm St");
        user.get("name").object().get("first").assert_string("alice");

        let raw = fs::read_to_string(dir.path().join("users/alice.json")).unwrap();
        assert!(raw.contains("\"boston\""));
    }

    #[tokio::test]
    async fn api_update_missing_user() {
        let (_dir, cli) = test_client(&[]);
        let resp = cli.put("/v1/users/ghost")
            .body_json(&serde_json::json!({"city": "boston"}))
            .send()
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_delete_twice() {
        let (_dir, cli) = test_client(&[("bob.json", BOB)]);
        let resp = cli.delete("/v1/users/bob").send().await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("num_deleted").assert_i64(1);

        let resp = cli.delete("/v1/users/bob").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }

    // ----------------------------- HTML pages -----------------------------
    #[tokio::test]
    async fn html_index_lists_users() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE), ("bob.json", BOB)]);
        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        let body = body_string(resp).await;
        assert!(body.contains("Alice Smith"));
        assert!(body.contains("Bob Jones"));
    }

    #[tokio::test]
    async fn html_show_user() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE)]);
        let resp = cli.get("/alice").send().await;
        resp.assert_status_is_ok();
        let body = body_string(resp).await;
        assert!(body.contains("<h2>Alice Smith</h2>"));
        assert!(body.contains("<dd>Nyc</dd>"));
    }

    #[tokio::test]
    async fn html_show_missing_user() {
        let (_dir, cli) = test_client(&[]);
        cli.get("/nobody").send().await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn html_form_update() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE)]);
        let resp = cli.put("/alice")
            .form(&[("city", "boston")])
            .send()
            .await;
        resp.assert_status_is_ok();
        assert!(body_string(resp).await.is_empty());

        let body = body_string(cli.get("/alice").send().await).await;
        assert!(body.contains("<dd>Boston</dd>"));
        assert!(body.contains("<h2>Alice Smith</h2>"));
    }

    #[tokio::test]
    async fn html_delete_twice() {
        let (_dir, cli) = test_client(&[("alice.json", ALICE)]);
        cli.delete("/alice").send().await.assert_status_is_ok();
        cli.delete("/alice").send().await.assert_status(StatusCode::NOT_FOUND);
        cli.get("/alice").send().await.assert_status(StatusCode::NOT_FOUND);
    }

    // ------------------------------- Other --------------------------------
    #[tokio::test]
    async fn static_files_served() {
        let (_dir, cli) = test_client(&[]);
        let resp = cli.get("/static/style.css").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("body {}").await;
    }

    #[tokio::test]
    async fn spec_served() {
        let (_dir, cli) = test_client(&[]);
        let resp = cli.get("/spec").send().await;
        resp.assert_status_is_ok();
        let body = body_string(resp).await;
        assert!(body.contains("/users/{username}"));
    }
}
