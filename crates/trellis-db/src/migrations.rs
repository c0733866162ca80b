/// A versioned schema migration applied on open.
pub struct Migration {
    pub version: i32,
    pub sql: &'static str,
}

pub const DOCUMENTS_SCHEMA_V1: Migration = Migration {
    version: 1,
    sql: r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_key TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_documents_doc_key ON documents(doc_key);
"#,
};
