//! Integration tests for the migration engine against real files.
//!
//! These tests drive the engine with scripts on disk, the file-backed
//! history and the delta script writer, the way the `strata` binary does.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use strata::migrate::{
    FileExecutedScriptStore, MigrationConfig, MigrationEngine, MigrationError, ScriptUpdateType,
    SqlScriptWriter,
};
use tempfile::TempDir;

type Engine = MigrationEngine<FileExecutedScriptStore, SqlScriptWriter>;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A script tree exercising every namespace.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("db");

    write(&db, "01_schema/01_users.sql", "CREATE TABLE users (id INT);\n");
    write(&db, "01_schema/02_orders.sql", "CREATE TABLE orders (id INT, user_id INT);\n");
    write(&db, "02_data.sql", "INSERT INTO users VALUES (1);\nINSERT INTO users VALUES (2);\n");
    write(&db, "views/user_orders.sql", "CREATE OR REPLACE VIEW uo AS SELECT * FROM orders;\n");
    write(&db, "preprocessing/01_disable.sql", "SET constraints = off;\n");
    write(&db, "postprocessing/01_grants.sql", "GRANT SELECT ON users TO reader;\n");

    dir
}

fn config(dir: &TempDir) -> MigrationConfig {
    MigrationConfig::new()
        .location(dir.path().join("db"))
        .history_file(dir.path().join("history.toml"))
}

fn engine(config: MigrationConfig) -> Engine {
    let history = FileExecutedScriptStore::new(&config.history.file);
    MigrationEngine::from_config(config, history, SqlScriptWriter::new()).unwrap()
}

#[tokio::test]
async fn test_full_update_then_up_to_date() {
    let dir = project();

    let first = engine(config(&dir));
    first.initialize().await.unwrap();
    let result = first.update_database().await.unwrap();

    assert_eq!(
        result.executed_scripts,
        vec![
            "preprocessing/01_disable.sql",
            "01_schema/01_users.sql",
            "01_schema/02_orders.sql",
            "02_data.sql",
            "views/user_orders.sql",
            "postprocessing/01_grants.sql",
        ]
    );

    let delta = first.executor().contents();
    assert!(delta.starts_with("-- script: preprocessing/01_disable.sql\n"));
    assert!(delta.contains("INSERT INTO users VALUES (1);\nINSERT INTO users VALUES (2);\n"));

    // a fresh engine reads the history file back
    let second = engine(config(&dir));
    let result = second.update_database().await.unwrap();
    assert!(!result.has_changes());
    assert!(second.executor().is_empty());
    assert!(second.status().await.unwrap().is_up_to_date());
}

#[tokio::test]
async fn test_added_script_and_modified_view() {
    let dir = project();
    engine(config(&dir)).update_database().await.unwrap();

    write(&dir.path().join("db"), "03_more.sql", "ALTER TABLE users ADD name TEXT;\n");
    write(
        &dir.path().join("db"),
        "views/user_orders.sql",
        "CREATE OR REPLACE VIEW uo AS SELECT id FROM orders;\n",
    );

    let engine = engine(config(&dir));
    let updates = engine.check_script_updates().await.unwrap();
    let types = updates
        .regularly_added_or_modified()
        .iter()
        .map(|u| u.update_type())
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![
            ScriptUpdateType::HigherIndexScriptAdded,
            ScriptUpdateType::RepeatableScriptUpdated,
        ]
    );

    let result = engine.update_database().await.unwrap();
    assert_eq!(
        result.executed_scripts,
        vec![
            "preprocessing/01_disable.sql",
            "03_more.sql",
            "views/user_orders.sql",
            "postprocessing/01_grants.sql",
        ]
    );
}

#[tokio::test]
async fn test_modified_indexed_script_is_irregular() {
    let dir = project();
    engine(config(&dir)).update_database().await.unwrap();

    write(&dir.path().join("db"), "02_data.sql", "INSERT INTO users VALUES (3);\n");

    let err = engine(config(&dir)).update_database().await.unwrap_err();
    match err {
        MigrationError::IrregularScriptUpdates { report } => {
            assert!(report.contains("02_data.sql"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_lower_index_script_is_irregular_unless_patch() {
    let dir = project();
    engine(config(&dir)).update_database().await.unwrap();
    let db = dir.path().join("db");

    write(&db, "01_schema/03_#patch_fix.sql", "UPDATE users SET id = id;\n");

    let err = engine(config(&dir)).update_database().await.unwrap_err();
    assert!(matches!(err, MigrationError::IrregularScriptUpdates { .. }));

    let result = engine(config(&dir).allow_out_of_sequence_patches(true))
        .update_database()
        .await
        .unwrap();
    assert!(
        result
            .executed_scripts
            .contains(&"01_schema/03_#patch_fix.sql".to_string())
    );
}

#[tokio::test]
async fn test_renamed_file_keeps_history() {
    let dir = project();
    engine(config(&dir)).update_database().await.unwrap();
    let db = dir.path().join("db");

    // rename keeps the modification time
    fs::rename(db.join("views/user_orders.sql"), db.join("views/orders_by_user.sql")).unwrap();

    let engine = engine(config(&dir));
    let result = engine.update_database().await.unwrap();

    assert_eq!(
        result.renamed_scripts,
        vec![(
            "views/user_orders.sql".to_string(),
            "views/orders_by_user.sql".to_string()
        )]
    );
    assert!(result.executed_scripts.is_empty());
    assert!(engine.executor().is_empty());

    let history = fs::read_to_string(dir.path().join("history.toml")).unwrap();
    assert!(history.contains("views/orders_by_user.sql"));
    assert!(!history.contains("views/user_orders.sql"));
}

#[tokio::test]
async fn test_baseline_revision_from_toml() {
    let dir = project();
    let db = dir.path().join("db");

    let config_text = format!(
        "[scripts]\nlocations = [{:?}]\nbaseline_revision = \"1.2\"\n\n[history]\nfile = {:?}\n",
        db.display().to_string(),
        dir.path().join("history.toml").display().to_string(),
    );
    let config = MigrationConfig::from_toml_str(&config_text).unwrap();

    let result = engine(config).update_database().await.unwrap();
    assert!(!result.executed_scripts.contains(&"01_schema/01_users.sql".to_string()));
    assert!(result.executed_scripts.contains(&"01_schema/02_orders.sql".to_string()));
    assert!(result.executed_scripts.contains(&"02_data.sql".to_string()));
    assert!(result.executed_scripts.contains(&"views/user_orders.sql".to_string()));
}

#[tokio::test]
async fn test_dry_run_leaves_no_history() {
    let dir = project();

    let engine = engine(config(&dir).dry_run(true));
    let result = engine.update_database().await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.executed_scripts.len(), 6);
    assert!(engine.executor().is_empty());
    assert!(!dir.path().join("history.toml").exists());
}

#[tokio::test]
async fn test_unterminated_statement_stops_update() {
    let dir = project();
    write(&dir.path().join("db"), "03_broken.sql", "UPDATE users SET id = 1\n");

    let err = engine(config(&dir)).update_database().await.unwrap_err();
    match err {
        MigrationError::Parse { script, line, .. } => {
            assert_eq!(script, "03_broken.sql");
            assert_eq!(line, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    let history = fs::read_to_string(dir.path().join("history.toml")).unwrap_or_default();
    assert!(!history.contains("03_broken.sql"));
}

#[tokio::test]
async fn test_mark_up_to_date_then_add() {
    let dir = project();

    let count = engine(config(&dir)).mark_database_as_up_to_date().await.unwrap();
    assert_eq!(count, 6);

    write(&dir.path().join("db"), "03_more.sql", "SELECT 1;\n");
    let result = engine(config(&dir)).update_database().await.unwrap();
    assert_eq!(
        result.executed_scripts,
        vec![
            "preprocessing/01_disable.sql",
            "03_more.sql",
            "postprocessing/01_grants.sql",
        ]
    );
}
