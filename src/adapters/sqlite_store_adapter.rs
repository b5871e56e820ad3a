//! SQLite store adapter for templates and committed trades.

use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::error::TradeportError;
use crate::domain::template::BrokerTemplate;
use crate::domain::trade::{ExtractedTrade, FieldMapping};
use crate::ports::config_port::ConfigPort;
use crate::ports::template_store::TemplateStore;
use crate::ports::trade_store::TradeStore;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeportError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TradeportError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, TradeportError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TradeportError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), TradeportError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS broker_template (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                broker_name TEXT NOT NULL UNIQUE,
                column_mappings TEXT NOT NULL,
                sample_headers TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                last_used_at TEXT
            );
            CREATE TABLE IF NOT EXISTS trade (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                position_size REAL NOT NULL,
                leverage REAL NOT NULL,
                funding_fee REAL NOT NULL,
                trading_fee REAL NOT NULL,
                margin REAL NOT NULL,
                opened_at TEXT NOT NULL,
                closed_at TEXT NOT NULL,
                profit_loss REAL NOT NULL,
                roi REAL NOT NULL,
                duration_days INTEGER NOT NULL,
                duration_hours INTEGER NOT NULL,
                duration_minutes INTEGER NOT NULL,
                period_of_day TEXT,
                broker TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_symbol ON trade(symbol);
            CREATE INDEX IF NOT EXISTS idx_trade_broker ON trade(broker);",
        )
        .map_err(|e: rusqlite::Error| TradeportError::Store {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    pub fn count_trades(&self) -> Result<usize, TradeportError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trade", [], |row| row.get(0))
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;
        Ok(count as usize)
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, TradeportError> {
        self.pool.get().map_err(|e: r2d2::Error| TradeportError::Store {
            reason: e.to_string(),
        })
    }

    fn now() -> String {
        chrono::Local::now().naive_local().format(TIME_FORMAT).to_string()
    }
}

impl TemplateStore for SqliteStoreAdapter {
    fn list_templates(&self) -> Result<Vec<BrokerTemplate>, TradeportError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, broker_name, column_mappings, sample_headers, usage_count, last_used_at
                 FROM broker_template
                 ORDER BY broker_name",
            )
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        let mut templates = Vec::new();
        for row in rows {
            let (id, broker_name, mappings_json, headers_json, usage_count, last_used) = row
                .map_err(|e: rusqlite::Error| TradeportError::Store {
                    reason: e.to_string(),
                })?;

            let column_mappings: FieldMapping = serde_json::from_str(&mappings_json)
                .map_err(|e| TradeportError::Store {
                    reason: format!("template {broker_name}: bad mapping: {e}"),
                })?;
            let sample_headers: Vec<String> = serde_json::from_str(&headers_json)
                .map_err(|e| TradeportError::Store {
                    reason: format!("template {broker_name}: bad headers: {e}"),
                })?;
            let last_used_at = last_used
                .and_then(|s| NaiveDateTime::parse_from_str(&s, TIME_FORMAT).ok());

            templates.push(BrokerTemplate {
                id,
                broker_name,
                column_mappings,
                sample_headers,
                usage_count,
                last_used_at,
            });
        }

        Ok(templates)
    }

    fn save_template(
        &self,
        broker_name: &str,
        column_mappings: &FieldMapping,
        sample_headers: &[String],
    ) -> Result<(), TradeportError> {
        let conn = self.conn()?;

        let mappings_json =
            serde_json::to_string(column_mappings).map_err(|e| TradeportError::Store {
                reason: e.to_string(),
            })?;
        let headers_json =
            serde_json::to_string(sample_headers).map_err(|e| TradeportError::Store {
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO broker_template (broker_name, column_mappings, sample_headers, usage_count, last_used_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(broker_name) DO UPDATE SET
                 column_mappings = excluded.column_mappings,
                 sample_headers = excluded.sample_headers,
                 last_used_at = excluded.last_used_at",
            params![broker_name, mappings_json, headers_json, Self::now()],
        )
        .map_err(|e: rusqlite::Error| TradeportError::Store {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn increment_usage(&self, template_id: i64) -> Result<(), TradeportError> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE broker_template
             SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE id = ?2",
            params![Self::now(), template_id],
        )
        .map_err(|e: rusqlite::Error| TradeportError::Store {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

impl TradeStore for SqliteStoreAdapter {
    fn commit_trades(
        &self,
        trades: &[ExtractedTrade],
        broker: &str,
    ) -> Result<usize, TradeportError> {
        let mut conn = self.conn()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        for trade in trades {
            tx.execute(
                "INSERT INTO trade (symbol, side, entry_price, exit_price, position_size,
                                    leverage, funding_fee, trading_fee, margin, opened_at,
                                    closed_at, profit_loss, roi, duration_days, duration_hours,
                                    duration_minutes, period_of_day, broker)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    trade.symbol,
                    trade.side.as_str(),
                    trade.entry_price,
                    trade.exit_price,
                    trade.position_size,
                    trade.leverage,
                    trade.funding_fee,
                    trade.trading_fee,
                    trade.margin,
                    trade.opened_at,
                    trade.closed_at,
                    trade.profit_loss,
                    trade.roi,
                    trade.duration_days,
                    trade.duration_hours,
                    trade.duration_minutes,
                    trade.period_of_day.map(|p| p.as_str()),
                    broker,
                ],
            )
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| TradeportError::Store {
                reason: e.to_string(),
            })?;

        Ok(trades.len())
    }
}
