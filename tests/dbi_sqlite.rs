// The uniform database interface against a real SQLite file.

use tempfile::TempDir;

use crawlbox::testhelp::{init_logging, sqlite_db_config};
use crawlbox::{AlterAction, DbSection, DbValue, Dbi, DbiError, Select};

const CHECKABLE_FIELDS: &[&str] = &[
    "rowid integer primary key autoincrement",
    "path text",
    "type text",
    "checksum int",
];

async fn open_db(dir: &TempDir) -> Dbi {
    init_logging();
    let path = dir.path().join("crawl.db");
    let cfg = sqlite_db_config(&path.display().to_string());
    Dbi::connect(&cfg, DbSection::Crawler)
        .await
        .expect("sqlite connect")
}

async fn seeded_db(dir: &TempDir) -> Dbi {
    let db = open_db(dir).await;
    db.create("checkables", CHECKABLE_FIELDS).await.expect("create");
    db.insert(
        "checkables",
        false,
        &["path", "type", "checksum"],
        &[
            vec!["/home/alice".into(), "d".into(), DbValue::Int(0)],
            vec!["/home/alice/notes.txt".into(), "f".into(), DbValue::Int(0)],
            vec!["/home/bob".into(), "d".into(), DbValue::Int(1)],
        ],
    )
    .await
    .expect("seed rows");
    db
}

#[tokio::test]
async fn create_exists_describe_drop() {
    let dir = TempDir::new().expect("tempdir");
    let db = open_db(&dir).await;

    assert!(!db.table_exists("checkables").await.expect("pre"));
    let shown = format!("{db:?}");
    assert!(shown.contains("Sqlite") && shown.contains("test_"), "got: {shown}");

    db.create("checkables", CHECKABLE_FIELDS).await.expect("create");
    assert!(db.table_exists("checkables").await.expect("post"));

    let columns = db.describe("checkables").await.expect("describe");
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["rowid", "path", "type", "checksum"]);

    db.drop("checkables").await.expect("drop");
    assert!(!db.table_exists("checkables").await.expect("dropped"));
}

#[tokio::test]
async fn tables_are_prefixed() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    assert_eq!(db.prefixed("checkables"), "test_checkables");
    assert_eq!(db.prefixed("test_checkables"), "test_checkables");
    assert_eq!(db.prefixed("@cartridge"), "cartridge");
    assert_eq!(db.table_list().await.expect("list"), ["test_checkables"]);

    // a name sharing the prefix text but not the namespace stays out of
    // the listing (the _ must match literally, not as a wildcard)
    db.create("@testXfoo", &["path text"]).await.expect("foreign");
    assert_eq!(db.table_list().await.expect("relist"), ["test_checkables"]);
}

#[tokio::test]
async fn select_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["path", "checksum"],
            where_clause: "type = ?",
            data: &[DbValue::Text("d".into())],
            orderby: "path",
            ..Default::default()
        })
        .await
        .expect("select");
    assert_eq!(
        rows,
        vec![
            vec![DbValue::Text("/home/alice".into()), DbValue::Int(0)],
            vec![DbValue::Text("/home/bob".into()), DbValue::Int(1)],
        ]
    );
}

#[tokio::test]
async fn select_groupby_and_limit() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["type", "count(*)"],
            groupby: "type",
            orderby: "type",
            ..Default::default()
        })
        .await
        .expect("group");
    assert_eq!(
        rows,
        vec![
            vec![DbValue::Text("d".into()), DbValue::Int(2)],
            vec![DbValue::Text("f".into()), DbValue::Int(1)],
        ]
    );

    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["path"],
            orderby: "path",
            limit: Some(1),
            ..Default::default()
        })
        .await
        .expect("limit");
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn update_and_delete() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    db.update(
        "checkables",
        &["checksum"],
        "path = ?",
        &[vec![DbValue::Int(7), "/home/alice".into()]],
    )
    .await
    .expect("update");

    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["checksum"],
            where_clause: "path = ?",
            data: &["/home/alice".into()],
            ..Default::default()
        })
        .await
        .expect("reselect");
    assert_eq!(rows, vec![vec![DbValue::Int(7)]]);

    db.delete("checkables", "type = ?", &["f".into()])
        .await
        .expect("delete");
    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["path"],
            ..Default::default()
        })
        .await
        .expect("count");
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn insert_ignore_skips_duplicates() {
    let dir = TempDir::new().expect("tempdir");
    let db = open_db(&dir).await;
    db.create("checkables", &["path text primary key", "type text"])
        .await
        .expect("create");

    let row: Vec<DbValue> = vec!["/home/alice".into(), "d".into()];
    db.insert("checkables", false, &["path", "type"], &[row.clone()])
        .await
        .expect("first insert");
    db.insert("checkables", false, &["path", "type"], &[row.clone()])
        .await
        .expect_err("duplicate key");
    db.insert("checkables", true, &["path", "type"], &[row])
        .await
        .expect("ignored duplicate");
}

#[tokio::test]
async fn null_values_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let db = open_db(&dir).await;
    db.create("checkables", &["path text", "checksum int"])
        .await
        .expect("create");
    db.insert(
        "checkables",
        false,
        &["path", "checksum"],
        &[vec!["/tmp/x".into(), DbValue::Null]],
    )
    .await
    .expect("insert null");

    let rows = db
        .select(&Select {
            table: "checkables",
            fields: &["path", "checksum"],
            ..Default::default()
        })
        .await
        .expect("select");
    assert_eq!(rows, vec![vec![DbValue::Text("/tmp/x".into()), DbValue::Null]]);
}

#[tokio::test]
async fn alter_adds_a_column_but_cannot_drop() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    db.alter("checkables", AlterAction::AddColumn { spec: "cos text", pos: None })
        .await
        .expect("addcol");
    let columns = db.describe("checkables").await.expect("describe");
    assert!(columns.iter().any(|c| c.name == "cos"));

    let err = db
        .alter("checkables", AlterAction::DropColumn { name: "cos" })
        .await
        .expect_err("sqlite dropcol");
    assert_eq!(err.to_string(), "SQLite does not support dropping columns");
}

#[tokio::test]
async fn validation_messages() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    let usage = |err: DbiError| match err {
        DbiError::Usage(text) => text,
        other => panic!("expected a usage error, got {other}"),
    };

    let err = db.insert("", false, &["path"], &[vec![DbValue::Null]]).await;
    assert_eq!(
        usage(err.expect_err("empty table")),
        "On insert(), table name must not be empty"
    );
    let err = db.insert("checkables", false, &[], &[vec![DbValue::Null]]).await;
    assert_eq!(
        usage(err.expect_err("empty fields")),
        "On insert(), fields must not be empty"
    );
    let err = db.insert("checkables", false, &["path"], &[]).await;
    assert_eq!(
        usage(err.expect_err("empty data")),
        "On insert(), data must not be empty"
    );

    let err = db
        .select(&Select {
            table: "checkables",
            fields: &[],
            ..Default::default()
        })
        .await;
    assert_eq!(
        usage(err.expect_err("wildcard")),
        "Wildcard selects are not supported. Please supply a list of fields."
    );

    let err = db
        .select(&Select {
            table: "checkables",
            fields: &["path"],
            where_clause: "type = ?",
            ..Default::default()
        })
        .await;
    assert_eq!(
        usage(err.expect_err("placeholder without data")),
        "Criteria are not fully specified"
    );

    let err = db
        .select(&Select {
            table: "checkables",
            fields: &["path"],
            data: &[DbValue::Int(1)],
            ..Default::default()
        })
        .await;
    assert_eq!(
        usage(err.expect_err("data without placeholder")),
        "Data would be ignored"
    );

    let err = db
        .update(
            "checkables",
            &["type"],
            "path = '?'",
            &[vec!["d".into()]],
        )
        .await;
    assert_eq!(
        usage(err.expect_err("quoted placeholder")),
        "Parameter placeholders should not be quoted"
    );

    let err = db
        .alter(
            "checkables",
            AlterAction::AddColumn { spec: "cos text; drop table test_checkables", pos: None },
        )
        .await;
    assert_eq!(usage(err.expect_err("spliced addcol")), "Invalid addcol argument");
}

#[tokio::test]
async fn closed_database_refuses_work() {
    let dir = TempDir::new().expect("tempdir");
    let db = seeded_db(&dir).await;

    db.close().await.expect("first close");
    let err = db.table_list().await.expect_err("closed");
    assert!(
        err.to_string().starts_with("Cannot operate on a closed database"),
        "got: {err}"
    );
    let err = db.close().await.expect_err("double close");
    assert!(
        err.to_string().starts_with("closing a closed connection"),
        "got: {err}"
    );
}

#[tokio::test]
async fn connect_validates_the_config_section() {
    init_logging();
    let cfg = crawlbox::Config::from_dict([("crawler", vec![("heartbeat", "10")])]);
    let err = Dbi::connect(&cfg, DbSection::Crawler)
        .await
        .expect_err("no dbi section");
    assert_eq!(err.to_string(), "A dbtype is required");

    let cfg = crawlbox::Config::from_dict([(
        "dbi-crawler",
        vec![("dbtype", "postgres"), ("dbname", "x"), ("tbl_prefix", "t")],
    )]);
    let err = Dbi::connect(&cfg, DbSection::Crawler)
        .await
        .expect_err("unknown engine");
    assert_eq!(err.to_string(), "Unrecognized database type: postgres");

    let cfg = crawlbox::Config::from_dict([("dbi-crawler", vec![("dbtype", "sqlite")])]);
    let err = Dbi::connect(&cfg, DbSection::Crawler)
        .await
        .expect_err("no dbname");
    assert_eq!(err.to_string(), "A dbname is required");

    let cfg = crawlbox::Config::from_dict([(
        "dbi-crawler",
        vec![("dbtype", "sqlite"), ("dbname", "crawl.db")],
    )]);
    let err = Dbi::connect(&cfg, DbSection::Crawler)
        .await
        .expect_err("no tbl_prefix");
    assert_eq!(err.to_string(), "Table prefix string (tbl_prefix) is required");
}

#[tokio::test]
async fn db2_connect_reports_missing_driver() {
    init_logging();
    let cfg = crawlbox::Config::from_dict([(
        "dbi-hpss",
        vec![
            ("dbtype", "db2"),
            ("cfg", "hpss_cfg"),
            ("tbl_prefix", "hpss"),
        ],
    )]);
    let err = Dbi::connect(&cfg, DbSection::Hpss { dbname: "cfg" })
        .await
        .expect_err("no db2 driver");
    assert_eq!(
        err.to_string(),
        "DB2 support is not available in this build (dbname=hpss_cfg)"
    );
}
