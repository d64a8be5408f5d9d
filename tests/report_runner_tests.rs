//! Integration tests for the report pipeline: stored definitions, parameter
//! merging, pagination, caching, exports and connection overrides, all
//! against in-memory databases.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::{Map, Value as JsonValue, json};
use sqlx::SqlitePool;

use reports_generator::{
    Config, CreateReport, Database, ReportResult, ReportsError, ReportsManager,
};

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        ..Config::default()
    }
}

async fn manager() -> ReportsManager {
    let manager = ReportsManager::connect(test_config()).await.unwrap();
    seed_employees(manager.database().pool()).await;
    manager
}

async fn seed_employees(pool: &SqlitePool) {
    sqlx::query(
        "CREATE TABLE employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            active INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .unwrap();

    for (id, name, department, active) in [
        (1, "Alice", "HR", 1),
        (2, "Bob", "IT", 1),
        (3, "Carol", "IT", 0),
        (4, "Dana", "Finance", 1),
    ] {
        sqlx::query("INSERT INTO employees (id, name, department, active) VALUES (?1, ?2, ?3, ?4)")
            .bind(id)
            .bind(name)
            .bind(department)
            .bind(active)
            .execute(pool)
            .await
            .unwrap();
    }
}

fn params(pairs: &[(&str, JsonValue)]) -> Map<String, JsonValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn sorted_names(result: &ReportResult) -> Vec<String> {
    let mut names: Vec<String> = result
        .rows
        .iter()
        .filter_map(|row| row.get("name"))
        .filter_map(JsonValue::as_str)
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn runs_stored_report_with_params() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "IT employees".to_string(),
            slug: "it-employees".to_string(),
            base_query: "select id, name, department from employees \
                         where department = :department and active = :active"
                .to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("it-employees")
        .await
        .unwrap()
        .params(params(&[("department", json!("IT")), ("active", json!(1))]))
        .run()
        .await
        .unwrap();

    assert_eq!(sorted_names(&result), vec!["Bob"]);
    assert_eq!(result.meta, json!({}));
}

#[tokio::test]
async fn uses_default_filters_when_param_missing() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Active employees".to_string(),
            slug: "active-employees".to_string(),
            base_query: "select id, name, department, active from employees where active = :active"
                .to_string(),
            filters: json!({"active": {"default": 1}}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("active-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(sorted_names(&result), vec!["Alice", "Bob", "Dana"]);
}

#[tokio::test]
async fn caller_param_overrides_filter_default() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Employees by active flag".to_string(),
            slug: "by-active".to_string(),
            base_query: "select id, name from employees where active = :active".to_string(),
            filters: json!({"active": {"default": 1}}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("by-active")
        .await
        .unwrap()
        .params(params(&[("active", json!(0))]))
        .run()
        .await
        .unwrap();

    assert_eq!(sorted_names(&result), vec!["Carol"]);
}

#[tokio::test]
async fn paginates_when_option_enabled() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "All employees paginated".to_string(),
            slug: "employees-paginated".to_string(),
            base_query: "select id, name from employees order by id asc".to_string(),
            options: json!({"paginate": true, "per_page": 2}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("employees-paginated")
        .await
        .unwrap()
        .options(params(&[("page", json!(2))]))
        .run()
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["name"], json!("Carol"));

    let pagination = &result.meta["pagination"];
    assert_eq!(pagination["total"], json!(4));
    assert_eq!(pagination["per_page"], json!(2));
    assert_eq!(pagination["current_page"], json!(2));
    assert_eq!(pagination["last_page"], json!(2));
}

#[tokio::test]
async fn pagination_past_the_last_page_is_empty_but_counted() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Paginated".to_string(),
            slug: "paginated".to_string(),
            base_query: "select id, name from employees order by id asc".to_string(),
            options: json!({"paginate": true, "per_page": 3}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("paginated")
        .await
        .unwrap()
        .options(params(&[("page", json!(99))]))
        .run()
        .await
        .unwrap();

    assert!(result.rows.is_empty());
    let pagination = &result.meta["pagination"];
    assert_eq!(pagination["total"], json!(4));
    assert_eq!(pagination["last_page"], json!(2));
}

#[tokio::test]
async fn pagination_clamps_nonpositive_page_to_one() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Paginated".to_string(),
            slug: "paginated".to_string(),
            base_query: "select id, name from employees order by id asc".to_string(),
            options: json!({"paginate": true, "per_page": 2, "page": 0}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager.report("paginated").await.unwrap().run().await.unwrap();

    assert_eq!(result.meta["pagination"]["current_page"], json!(1));
    assert_eq!(result.rows[0]["name"], json!("Alice"));
}

#[tokio::test]
async fn runs_raw_query_without_stored_definition() {
    let manager = manager().await;

    let result = manager
        .raw(
            "select count(*) as total_active from employees where active = :active",
            params(&[("active", json!(1))]),
            Map::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.rows[0]["total_active"], json!(3));
    assert!(result.slug.starts_with("raw-report-"));
}

#[tokio::test]
async fn exports_to_csv() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "CSV employees".to_string(),
            slug: "csv-employees".to_string(),
            base_query: "select id, name, department from employees order by id asc".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager.report("csv-employees").await.unwrap().run().await.unwrap();

    assert_eq!(
        result.to_csv(),
        "id,name,department\n\
         1,Alice,HR\n\
         2,Bob,IT\n\
         3,Carol,IT\n\
         4,Dana,Finance"
    );
}

#[tokio::test]
async fn exports_to_datatables() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "DT employees".to_string(),
            slug: "dt-employees".to_string(),
            base_query: "select id, name from employees order by id asc".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager.report("dt-employees").await.unwrap().run().await.unwrap();
    let dt = result.to_data_tables();

    assert_eq!(dt["recordsTotal"], json!(4));
    assert_eq!(dt["recordsFiltered"], json!(4));
    assert_eq!(dt["data"].as_array().unwrap().len(), 4);

    let columns: Vec<&str> = dt["data"][0]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(columns, vec!["id", "name"]);
}

#[tokio::test]
async fn exports_to_json_api() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "JSON API employees".to_string(),
            slug: "jsonapi-employees".to_string(),
            base_query: "select id, name from employees order by id asc".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("jsonapi-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    let doc = result.to_json_api("employee");

    assert_eq!(doc["data"].as_array().unwrap().len(), 4);
    assert_eq!(doc["data"][0]["type"], json!("employee"));
    assert_eq!(doc["data"][0]["id"], json!("1"));
    assert_eq!(doc["data"][0]["attributes"]["name"], json!("Alice"));
}

#[tokio::test]
async fn cached_report_survives_data_changes_until_invalidated() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Cached employees".to_string(),
            slug: "cached-employees".to_string(),
            base_query: "select id, name from employees".to_string(),
            cache_ttl: Some(300),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let first = manager
        .report("cached-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 4);

    sqlx::query("INSERT INTO employees (id, name, department, active) VALUES (5, 'Eve', 'IT', 1)")
        .execute(manager.database().pool())
        .await
        .unwrap();

    let second = manager
        .report("cached-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.rows.len(), 4);

    manager.cache().invalidate_all();

    let third = manager
        .report("cached-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(third.rows.len(), 5);
}

#[tokio::test]
async fn uncached_report_sees_data_changes_immediately() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Live employees".to_string(),
            slug: "live-employees".to_string(),
            base_query: "select id, name from employees".to_string(),
            cache_ttl: Some(0),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let first = manager
        .report("live-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 4);

    sqlx::query("INSERT INTO employees (id, name, department, active) VALUES (5, 'Eve', 'IT', 1)")
        .execute(manager.database().pool())
        .await
        .unwrap();

    let second = manager
        .report("live-employees")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.rows.len(), 5);
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let manager = manager().await;

    let err = manager.report("missing").await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<ReportsError>(),
        Some(ReportsError::ReportNotFound(slug)) if slug == "missing"
    );
}

#[tokio::test]
async fn inactive_report_is_not_found() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Retired".to_string(),
            slug: "retired".to_string(),
            base_query: "select 1 as one".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    assert!(manager.repository().set_active("retired", false).await.unwrap());

    let err = manager.report("retired").await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<ReportsError>(),
        Some(ReportsError::ReportNotFound(_))
    );

    // still reachable for admin tooling, just not for execution
    assert!(manager.repository().find_by_slug("retired").await.unwrap().is_some());
    assert!(
        manager
            .repository()
            .find_active_by_slug("retired")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn report_from_runs_an_already_loaded_record() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Headcount".to_string(),
            slug: "headcount".to_string(),
            base_query: "select count(*) as total from employees".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let record = manager
        .repository()
        .find_by_slug("headcount")
        .await
        .unwrap()
        .unwrap();

    let result = manager
        .report_from(record)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.rows[0]["total"], json!(4));
}

#[tokio::test]
async fn attaching_a_connection_at_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/extra.db", dir.path().display());

    let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
    let mut db = Database::new(pool);
    db.attach("extra", &url).await.unwrap();

    assert!(db.connection(Some("extra")).is_ok());
    assert!(db.connection(None).is_ok());
    assert_matches!(
        db.connection(Some("other")),
        Err(ReportsError::UnknownConnection(name)) if name == "other"
    );
}

#[tokio::test]
async fn unknown_connection_override_is_an_error() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Analytics".to_string(),
            slug: "analytics".to_string(),
            connection: Some("analytics".to_string()),
            base_query: "select 1 as one".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let err = manager.report("analytics").await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<ReportsError>(),
        Some(ReportsError::UnknownConnection(name)) if name == "analytics"
    );
}

#[tokio::test]
async fn report_runs_on_attached_connection() {
    let dir = tempfile::tempdir().unwrap();
    let archive_url = format!("sqlite:{}/archive.db", dir.path().display());

    let mut config = test_config();
    config.connections.insert("archive".to_string(), archive_url);

    let manager = ReportsManager::connect(config).await.unwrap();

    let archive = manager.database().connection(Some("archive")).unwrap();
    sqlx::query("CREATE TABLE metrics (id INTEGER PRIMARY KEY, value INTEGER NOT NULL)")
        .execute(archive)
        .await
        .unwrap();
    sqlx::query("INSERT INTO metrics (id, value) VALUES (1, 42)")
        .execute(archive)
        .await
        .unwrap();

    manager
        .repository()
        .create(CreateReport {
            name: "Archive metrics".to_string(),
            slug: "archive-metrics".to_string(),
            connection: Some("archive".to_string()),
            base_query: "select id, value from metrics".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let result = manager
        .report("archive-metrics")
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.rows[0]["value"], json!(42));
}

#[tokio::test]
async fn missing_parameter_is_an_error() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Needs a param".to_string(),
            slug: "needs-param".to_string(),
            base_query: "select id from employees where department = :department".to_string(),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let err = manager
        .report("needs-param")
        .await
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_matches!(
        err.downcast_ref::<ReportsError>(),
        Some(ReportsError::MissingParameter(name)) if name == "department"
    );
}

#[tokio::test]
async fn render_returns_embeddable_json() {
    let manager = manager().await;
    manager
        .repository()
        .create(CreateReport {
            name: "Departments".to_string(),
            slug: "departments".to_string(),
            base_query: "select distinct department from employees where active = :active \
                         order by department"
                .to_string(),
            filters: json!({"active": {"default": 1}}),
            ..CreateReport::default()
        })
        .await
        .unwrap();

    let rendered = manager
        .render("departments", Map::new(), Map::new())
        .await
        .unwrap();

    let value: JsonValue = serde_json::from_str(&rendered).unwrap();
    assert_eq!(value["slug"], json!("departments"));
    assert_eq!(value["rows"][0]["department"], json!("Finance"));
    assert_eq!(value["rows"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn row_values_keep_their_runtime_types() {
    let manager = manager().await;

    let result = manager
        .raw(
            "select name, id, id * 1.5 as score, null as missing, x'DEADBEEF' as payload \
             from employees where id = :id",
            params(&[("id", json!(2))]),
            Map::new(),
        )
        .await
        .unwrap();

    let row = &result.rows[0];
    assert_eq!(row["name"], json!("Bob"));
    assert_eq!(row["id"], json!(2));
    assert_eq!(row["score"], json!(3.0));
    assert_eq!(row["missing"], JsonValue::Null);
    // blobs come back base64-encoded
    assert_eq!(row["payload"], json!("3q2+7w=="));
}

#[tokio::test]
async fn listing_filters_inactive_definitions() {
    let manager = manager().await;
    for (slug, active) in [("first", true), ("second", false)] {
        manager
            .repository()
            .create(CreateReport {
                name: slug.to_string(),
                slug: slug.to_string(),
                base_query: "select 1 as one".to_string(),
                is_active: active,
                ..CreateReport::default()
            })
            .await
            .unwrap();
    }

    let active_only = manager.repository().list(true).await.unwrap();
    assert_eq!(active_only.len(), 1);
    assert_eq!(active_only[0].slug, "first");

    let everything = manager.repository().list(false).await.unwrap();
    assert_eq!(everything.len(), 2);

    assert!(manager.repository().delete("second").await.unwrap());
    assert!(!manager.repository().delete("second").await.unwrap());
    assert_eq!(manager.repository().list(false).await.unwrap().len(), 1);
}
