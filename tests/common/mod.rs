#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use tradeport::domain::error::TradeportError;
use tradeport::domain::table::UploadedFile;
use tradeport::domain::template::BrokerTemplate;
use tradeport::domain::trade::{ExtractedTrade, FieldMapping, TradeField};
use tradeport::ports::template_store::TemplateStore;
use tradeport::ports::trade_store::TradeStore;

/// In-memory template library fake. Upserts by broker name like the real
/// store and stamps a monotonically increasing recency.
pub struct InMemoryTemplateStore {
    pub templates: RefCell<Vec<BrokerTemplate>>,
    pub fail_saves: bool,
    next_id: Cell<i64>,
    clock: Cell<i64>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: RefCell::new(Vec::new()),
            fail_saves: false,
            next_id: Cell::new(1),
            clock: Cell::new(0),
        }
    }

    pub fn with_template(self, template: BrokerTemplate) -> Self {
        self.next_id.set(self.next_id.get().max(template.id + 1));
        self.templates.borrow_mut().push(template);
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn usage_of(&self, broker: &str) -> i64 {
        self.templates
            .borrow()
            .iter()
            .find(|t| t.broker_name == broker)
            .map(|t| t.usage_count)
            .unwrap_or(0)
    }

    fn tick(&self) -> chrono::NaiveDateTime {
        let t = self.clock.get() + 1;
        self.clock.set(t);
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(t)
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn list_templates(&self) -> Result<Vec<BrokerTemplate>, TradeportError> {
        Ok(self.templates.borrow().clone())
    }

    fn save_template(
        &self,
        broker_name: &str,
        column_mappings: &FieldMapping,
        sample_headers: &[String],
    ) -> Result<(), TradeportError> {
        if self.fail_saves {
            return Err(TradeportError::Store {
                reason: "template store offline".into(),
            });
        }

        let now = self.tick();
        let mut templates = self.templates.borrow_mut();
        if let Some(existing) = templates.iter_mut().find(|t| t.broker_name == broker_name) {
            existing.column_mappings = column_mappings.clone();
            existing.sample_headers = sample_headers.to_vec();
            existing.last_used_at = Some(now);
        } else {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            let mut template = BrokerTemplate::new(
                id,
                broker_name,
                column_mappings.clone(),
                sample_headers.to_vec(),
            );
            template.last_used_at = Some(now);
            templates.push(template);
        }
        Ok(())
    }

    fn increment_usage(&self, template_id: i64) -> Result<(), TradeportError> {
        let now = self.tick();
        if let Some(template) = self
            .templates
            .borrow_mut()
            .iter_mut()
            .find(|t| t.id == template_id)
        {
            template.usage_count += 1;
            template.last_used_at = Some(now);
        }
        Ok(())
    }
}

/// In-memory commit endpoint fake.
pub struct InMemoryTradeStore {
    pub committed: RefCell<Vec<ExtractedTrade>>,
    pub brokers: RefCell<Vec<String>>,
    pub fail: bool,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self {
            committed: RefCell::new(Vec::new()),
            brokers: RefCell::new(Vec::new()),
            fail: false,
        }
    }
}

impl TradeStore for InMemoryTradeStore {
    fn commit_trades(
        &self,
        trades: &[ExtractedTrade],
        broker: &str,
    ) -> Result<usize, TradeportError> {
        if self.fail {
            return Err(TradeportError::Store {
                reason: "commit endpoint offline".into(),
            });
        }
        self.committed.borrow_mut().extend(trades.iter().cloned());
        self.brokers.borrow_mut().push(broker.to_string());
        Ok(trades.len())
    }
}

pub fn csv_upload(name: &str, content: &str) -> UploadedFile {
    UploadedFile::new(name, content.as_bytes().to_vec())
}

pub const BYBIT_CSV: &str = "Date,Symbol,Side,Entry,Exit,Qty\n\
    2024-01-01T09:00:00,BTCUSDT,Buy,100,110,2\n\
    2024-01-02T20:15:00,ETHUSDT,Sell,50,40,3\n";

pub fn bybit_headers() -> Vec<String> {
    ["Date", "Symbol", "Side", "Entry", "Exit", "Qty"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

pub fn bybit_mapping() -> FieldMapping {
    [
        (TradeField::OpenedAt, "Date"),
        (TradeField::Symbol, "Symbol"),
        (TradeField::Side, "Side"),
        (TradeField::EntryPrice, "Entry"),
        (TradeField::ExitPrice, "Exit"),
        (TradeField::PositionSize, "Qty"),
    ]
    .iter()
    .map(|(f, c)| (*f, c.to_string()))
    .collect()
}

pub fn bybit_template(id: i64) -> BrokerTemplate {
    BrokerTemplate::new(id, "Bybit", bybit_mapping(), bybit_headers())
}
