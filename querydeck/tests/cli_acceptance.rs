use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::Output;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    api_url: String,
}

impl CliTestEnv {
    fn new(server: &MockServer) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            api_url: server.uri(),
        }
    }

    fn token_path(&self) -> PathBuf {
        self.xdg_data.join("querydeck/token.json")
    }

    /// Pretend `alice` of client 8 logged in earlier
    fn seed_token(&self) {
        let token = json!({
            "access_token": "seeded-token",
            "expires_at": "2999-01-01T00:00:00Z",
            "username": "alice",
            "client_id": 8
        });
        let path = self.token_path();
        fs::create_dir_all(path.parent().expect("missing token parent"))
            .expect("failed to create token directory");
        fs::write(&path, serde_json::to_vec(&token).expect("token JSON"))
            .expect("failed to write token");
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("querydeck")));
        command
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env("QUERYDECK_API_URL", &self.api_url)
            .env_remove("QUERYDECK_PASSWORD")
            .env_remove("RUST_LOG");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to execute querydeck: {e}"))
    }
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "querydeck {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

async fn mount_revenue_question(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/database/query"))
        .and(header("authorization", "Bearer seeded-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": "sql_query",
            "sql_query": "SELECT SUM(revenue) AS total FROM sales",
            "filtered_tables": ["sales"]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/database/execute-sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": ["total"],
            "data": [{"total": 1000}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn status_reports_backend_and_login_state() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);

    env.command(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Backend URL:  {}", server.uri())))
        .stdout(predicate::str::contains("Status: Not logged in"));

    env.seed_token();
    env.command(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: Logged in as alice"));
}

#[tokio::test]
async fn verbose_writes_log_to_state_dir() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);

    env.command(&["-v", "status"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Logging to"));

    let log_dir = env.xdg_state.join("querydeck");
    let logs: Vec<_> = fs::read_dir(&log_dir)
        .expect("log directory should exist")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("querydeck.log"))
        .collect();
    assert_eq!(logs.len(), 1, "expected one daily log file in {}", log_dir.display());
}

#[tokio::test]
async fn login_stores_token_and_logout_removes_it() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .and(body_json(json!({"username": "alice", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "bearer",
            "user": {"id": 1, "username": "alice", "role": "client", "client_id": 8},
            "client": {"id": 8, "client_name": "Acme", "email": "ops@acme.test"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let args = ["login", "alice", "--password", "s3cret"];
    let output = env.run(&args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Logged in as alice"), "got:\n{stdout}");
    assert!(stdout.contains("Acme (#8)"), "got:\n{stdout}");

    let stored: Value =
        serde_json::from_slice(&fs::read(env.token_path()).expect("token file should exist"))
            .expect("token file should be JSON");
    assert_eq!(stored["access_token"], "fresh-token");
    assert_eq!(stored["client_id"], 8);

    env.command(&["logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out."));
    assert!(!env.token_path().exists());

    env.command(&["logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."));
}

#[tokio::test]
async fn login_with_bad_password_fails() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    env.command(&["login", "alice"])
        .write_stdin("wrong\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("incorrect username or password"));
    assert!(!env.token_path().exists());
}

#[tokio::test]
async fn commands_require_login() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);

    env.command(&["ask", "how", "many", "orders?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"))
        .stderr(predicate::str::contains("querydeck login"));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn ask_prints_turn_and_single_value_as_card() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);
    env.seed_token();
    mount_revenue_question(&server).await;

    let args = ["ask", "show", "total", "revenue"];
    let output = env.run(&args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[SQL QUERY] show total revenue"), "got:\n{stdout}");
    assert!(stdout.contains("SQL: SELECT SUM(revenue) AS total FROM sales"));
    assert!(stdout.contains("Tables: sales"));
    assert!(stdout.contains("total: 1000"), "got:\n{stdout}");
}

#[tokio::test]
async fn ask_without_connected_database_explains_503() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);
    env.seed_token();

    Mock::given(method("POST"))
        .and(path("/database/query"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "detail": "Database not connected. Please connect first."
        })))
        .mount(&server)
        .await;

    env.command(&["ask", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database not connected"))
        .stderr(predicate::str::contains("No database is connected"));
    assert!(env.token_path().exists(), "503 must not log the user out");
}

#[tokio::test]
async fn rejected_token_is_forgotten() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);
    env.seed_token();

    Mock::given(method("GET"))
        .and(path("/dashboards/client/8"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    env.command(&["dashboards", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("querydeck login"));
    assert!(!env.token_path().exists());
}

#[tokio::test]
async fn dashboards_list_show_and_delete() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);
    env.seed_token();

    Mock::given(method("GET"))
        .and(path("/dashboards/client/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 3,
                "client_id": 8,
                "db_id": 2,
                "db_name": "warehouse",
                "title": "Weekly revenue",
                "chats": [{"question": "q", "intent": "casual_chat"}],
                "charts": [],
                "created_at": "2025-03-01T10:00:00"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboards/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "client_id": 8,
            "db_id": 2,
            "db_name": "warehouse",
            "title": "Weekly revenue",
            "chats": [{
                "question": "revenue by region",
                "intent": "sql_query",
                "sql_query": "SELECT region, SUM(revenue) AS revenue FROM sales GROUP BY region"
            }],
            "charts": [{
                "id": 1700000000000_i64,
                "title": "Revenue",
                "type": {"id": "pie", "name": "Pie Chart", "hasAxis": false},
                "data": {
                    "labels": ["north", "south"],
                    "datasets": [{"label": "revenue", "data": ["75", "25"]}]
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/dashboards/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    env.command(&["dashboards", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weekly revenue"))
        .stdout(predicate::str::contains("warehouse"));

    env.command(&["dashboards", "show", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weekly revenue (dashboard #3)"))
        .stdout(predicate::str::contains("#1 [SQL QUERY] revenue by region"))
        .stdout(predicate::str::contains("Revenue [Pie Chart]"))
        .stdout(predicate::str::contains("75.0%"));

    env.command(&["dashboards", "delete", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted dashboard #3"));
}

#[tokio::test]
async fn studio_asks_charts_and_saves() {
    let server = MockServer::start().await;
    let env = CliTestEnv::new(&server);
    env.seed_token();

    Mock::given(method("GET"))
        .and(path("/databases/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 2, "db_name": "warehouse"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/database/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": "sql_query",
            "sql_query": "SELECT region, SUM(revenue) AS revenue FROM sales GROUP BY region",
            "filtered_tables": ["sales"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/database/execute-sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": ["region", "revenue"],
            "data": [
                {"region": "north", "revenue": 30},
                {"region": "south", "revenue": 10}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dashboards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11,
            "client_id": 8,
            "title": "Regions"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/dashboards/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11,
            "client_id": 8,
            "title": "Regions v2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let script = "\
revenue by region
:chart bar region revenue Revenue by region
:chart bar nope revenue Broken
:save Regions
:save Regions v2
:quit
";

    env.command(&["studio", "--db", "2"])
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Database: warehouse"))
        .stdout(predicate::str::contains("(2 rows)"))
        .stdout(predicate::str::contains("Revenue by region [Bar Chart]"))
        .stdout(predicate::str::contains("Error: unknown category column: nope"))
        .stdout(predicate::str::contains("Saved dashboard #11 \"Regions\""))
        .stdout(predicate::str::contains("Saved dashboard #11 \"Regions v2\""));

    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/dashboards")
        .expect("dashboard should be created");
    let body: Value = serde_json::from_slice(&create.body).expect("JSON body");
    assert_eq!(body["db_id"], 2);
    assert_eq!(body["client_id"], 8);
    assert_eq!(body["chats"].as_array().unwrap().len(), 1);
    assert_eq!(body["charts"].as_array().unwrap().len(), 1);
    assert_eq!(body["charts"][0]["data"]["labels"], json!(["north", "south"]));
}
