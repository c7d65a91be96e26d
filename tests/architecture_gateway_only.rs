use std::fs;
use std::path::{Path, PathBuf};

const ALLOWED_SQLX_CALLERS: &[&str] = &["src/adapters/postgres.rs", "src/error.rs"];

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// Everything outside the Postgres adapter must reach storage through the
/// `PersistenceGateway` trait, never through sqlx directly. This keeps the
/// engine replayable against in-memory gateways and the SQL surface in one
/// reviewable place.
#[test]
fn direct_sqlx_usage_is_limited_to_the_postgres_adapter() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let src_root = repo_root.join("src");
    let mut files = Vec::new();
    collect_rust_files(&src_root, &mut files);

    let mut offenders = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        if ALLOWED_SQLX_CALLERS.iter().any(|allowed| *allowed == rel) {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            let touches_sqlx = trimmed.contains("sqlx::query")
                || trimmed.contains("use sqlx")
                || trimmed.contains("sqlx::migrate");
            if touches_sqlx {
                offenders.push(format!("{rel}:{}: {}", idx + 1, trimmed));
            }
        }
    }

    assert!(
        offenders.is_empty(),
        "direct sqlx usage detected outside the Postgres adapter:\n{}",
        offenders.join("\n")
    );
}
