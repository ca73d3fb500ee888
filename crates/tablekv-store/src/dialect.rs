//! SQL dialects for the supported backends.
//!
//! A [`Dialect`] renders every statement the store issues and classifies
//! backend errors. Only a validated, quoted [`Namespace`] is ever
//! interpolated into statement text; keys, values and the database name are
//! bound with `?`.

use crate::namespace::Namespace;

/// SQLSTATE for "base table or view not found" (MySQL 1146 and 1051).
const MYSQL_NO_SUCH_TABLE: &str = "42S02";

/// Backend flavour of SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Quote a validated namespace as a table identifier, so reserved words
    /// such as `order` stay usable. The allow-list excludes quote characters.
    pub fn quote(self, ns: &Namespace) -> String {
        match self {
            Dialect::MySql => format!("`{ns}`"),
            Dialect::Sqlite => format!("\"{ns}\""),
        }
    }

    pub fn create_table(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        match self {
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {t} (id VARCHAR(14) NOT NULL, data JSON NOT NULL, PRIMARY KEY (id)) ENGINE=InnoDB"
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {t} (id VARCHAR(14) NOT NULL, data TEXT NOT NULL, PRIMARY KEY (id))"
            ),
        }
    }

    pub fn drop_table(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        format!("DROP TABLE {t}")
    }

    /// Table listing. For MySQL the database name is bound as the single
    /// parameter; SQLite takes none.
    pub fn list_tables(self) -> &'static str {
        match self {
            Dialect::MySql => {
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
                 WHERE table_schema = ? ORDER BY table_name"
            }
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        }
    }

    pub fn binds_database_name(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    pub fn count_key(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        format!("SELECT COUNT(1) FROM {t} WHERE id = ?")
    }

    /// Plain insert; fails with a uniqueness violation if the key exists.
    pub fn insert(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        format!("INSERT INTO {t} (id, data) VALUES (?, ?)")
    }

    /// Insert-or-replace. Binds `(id, data, data)`.
    pub fn upsert(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        match self {
            Dialect::MySql => {
                format!("INSERT INTO {t} (id, data) VALUES (?, ?) ON DUPLICATE KEY UPDATE data = ?")
            }
            Dialect::Sqlite => {
                format!("INSERT INTO {t} (id, data) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET data = ?")
            }
        }
    }

    pub fn get(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        match self {
            // JSON columns are read back as text.
            Dialect::MySql => format!("SELECT CAST(data AS CHAR) FROM {t} WHERE id = ?"),
            Dialect::Sqlite => format!("SELECT data FROM {t} WHERE id = ?"),
        }
    }

    pub fn get_all(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        match self {
            Dialect::MySql => format!("SELECT id, CAST(data AS CHAR) FROM {t} ORDER BY id"),
            Dialect::Sqlite => format!("SELECT id, data FROM {t} ORDER BY id"),
        }
    }

    pub fn delete(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        format!("DELETE FROM {t} WHERE id = ?")
    }

    pub fn delete_all(self, ns: &Namespace) -> String {
        let t = self.quote(ns);
        match self {
            Dialect::MySql => format!("TRUNCATE TABLE {t}"),
            Dialect::Sqlite => format!("DELETE FROM {t}"),
        }
    }

    /// Whether `err` means the namespace table does not exist.
    pub fn is_missing_table(self, err: &sqlx::Error) -> bool {
        let Some(db_err) = err.as_database_error() else {
            return false;
        };
        match self {
            Dialect::MySql => db_err.code().as_deref() == Some(MYSQL_NO_SUCH_TABLE),
            Dialect::Sqlite => db_err.message().starts_with("no such table"),
        }
    }

    /// Whether `err` is a primary-key collision.
    pub fn is_duplicate_key(self, err: &sqlx::Error) -> bool {
        err.as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
    }
}
