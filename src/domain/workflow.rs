//! Import workflow state machine.
//!
//! `UPLOAD → (parse) → PREVIEW | MAPPING`; `MAPPING → (mapping submitted) →
//! PREVIEW`; `PREVIEW → (back) → MAPPING`; `PREVIEW → (commit) → COMMITTED`
//! (terminal); any state `→ (reset) → UPLOAD`. The direct `UPLOAD → PREVIEW`
//! jump happens only on a high-confidence template match.
//!
//! Single-flow and synchronous: one file in flight per workflow instance,
//! store writes fire-and-forget with respect to state transitions.

use std::mem;
use tracing::{info, warn};

use super::error::TradeportError;
use super::matcher::{MATCH_THRESHOLD, best_match};
use super::parser::ParseStrategy;
use super::table::{RawTable, UploadedFile};
use super::trade::{ExtractedTrade, FieldMapping};
use super::transform::transform_table;
use crate::ports::template_store::TemplateStore;
use crate::ports::trade_store::TradeStore;

#[derive(Debug)]
pub enum WorkflowState {
    Upload,
    Mapping {
        table: RawTable,
    },
    Preview {
        table: RawTable,
        mapping: FieldMapping,
        broker: Option<String>,
        trades: Vec<ExtractedTrade>,
        selected: Vec<bool>,
    },
    Committed {
        count: usize,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Upload => "upload",
            WorkflowState::Mapping { .. } => "mapping",
            WorkflowState::Preview { .. } => "preview",
            WorkflowState::Committed { .. } => "committed",
        }
    }
}

pub struct ImportWorkflow<'a> {
    parser: ParseStrategy<'a>,
    templates: &'a dyn TemplateStore,
    trades: &'a dyn TradeStore,
    match_threshold: f64,
    state: WorkflowState,
}

impl<'a> ImportWorkflow<'a> {
    pub fn new(
        parser: ParseStrategy<'a>,
        templates: &'a dyn TemplateStore,
        trades: &'a dyn TradeStore,
    ) -> Self {
        Self {
            parser,
            templates,
            trades,
            match_threshold: MATCH_THRESHOLD,
            state: WorkflowState::Upload,
        }
    }

    /// Override the auto-apply threshold (policy default: 80).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Parse an upload and route it: a confident template match jumps
    /// straight to preview, anything else goes to manual mapping.
    ///
    /// An unreachable template library is not fatal — the upload routes to
    /// manual mapping as if nothing matched.
    pub fn upload(&mut self, file: &UploadedFile) -> Result<&WorkflowState, TradeportError> {
        if !matches!(self.state, WorkflowState::Upload) {
            return Err(TradeportError::InvalidState {
                operation: "upload",
                state: self.state.name(),
            });
        }

        let table = self.parser.parse(file)?;

        let library = match self.templates.list_templates() {
            Ok(templates) => templates,
            Err(e) => {
                warn!(error = %e, "template library unavailable, routing to manual mapping");
                Vec::new()
            }
        };

        match best_match(&table.headers, &library, self.match_threshold) {
            Some((template, score)) => {
                info!(
                    broker = %template.broker_name,
                    score,
                    "template matched, skipping manual mapping"
                );
                if let Err(e) = self.templates.increment_usage(template.id) {
                    warn!(error = %e, "failed to bump template usage");
                }
                let mapping = template.column_mappings.clone();
                let broker = Some(template.broker_name.clone());
                self.enter_preview(table, mapping, broker);
            }
            None => {
                self.state = WorkflowState::Mapping { table };
            }
        }

        Ok(&self.state)
    }

    /// Complete manual mapping. Naming a broker also teaches the template
    /// library — best-effort, a save failure never blocks the transition.
    pub fn submit_mapping(
        &mut self,
        mapping: FieldMapping,
        broker: Option<&str>,
    ) -> Result<&WorkflowState, TradeportError> {
        match mem::replace(&mut self.state, WorkflowState::Upload) {
            WorkflowState::Mapping { table } => {
                if let Some(column) = mapping.values().find(|c| !table.has_header(c.as_str())) {
                    let column = column.clone();
                    self.state = WorkflowState::Mapping { table };
                    return Err(TradeportError::UnknownColumn { column });
                }

                let broker = broker.map(str::trim).filter(|b| !b.is_empty());
                if let Some(name) = broker {
                    if let Err(e) =
                        self.templates.save_template(name, &mapping, &table.headers)
                    {
                        warn!(broker = name, error = %e, "template save failed, continuing import");
                    }
                }

                self.enter_preview(table, mapping, broker.map(str::to_string));
                Ok(&self.state)
            }
            other => {
                let err = TradeportError::InvalidState {
                    operation: "submit_mapping",
                    state: other.name(),
                };
                self.state = other;
                Err(err)
            }
        }
    }

    /// Return from preview to adjust the mapping. The transformed set is
    /// discarded; it is rebuilt wholesale on the next submission.
    pub fn back_to_mapping(&mut self) -> Result<&WorkflowState, TradeportError> {
        match mem::replace(&mut self.state, WorkflowState::Upload) {
            WorkflowState::Preview { table, .. } => {
                self.state = WorkflowState::Mapping { table };
                Ok(&self.state)
            }
            other => {
                let err = TradeportError::InvalidState {
                    operation: "back_to_mapping",
                    state: other.name(),
                };
                self.state = other;
                Err(err)
            }
        }
    }

    /// Flip one trade's selection flag. Out-of-range indexes are ignored.
    pub fn toggle_selection(&mut self, index: usize) -> Result<(), TradeportError> {
        match &mut self.state {
            WorkflowState::Preview { selected, .. } => {
                if let Some(flag) = selected.get_mut(index) {
                    *flag = !*flag;
                }
                Ok(())
            }
            other => Err(TradeportError::InvalidState {
                operation: "toggle_selection",
                state: other.name(),
            }),
        }
    }

    pub fn select_all(&mut self) -> Result<(), TradeportError> {
        self.set_all(true, "select_all")
    }

    pub fn deselect_all(&mut self) -> Result<(), TradeportError> {
        self.set_all(false, "deselect_all")
    }

    fn set_all(&mut self, value: bool, operation: &'static str) -> Result<(), TradeportError> {
        match &mut self.state {
            WorkflowState::Preview { selected, .. } => {
                selected.iter_mut().for_each(|flag| *flag = value);
                Ok(())
            }
            other => Err(TradeportError::InvalidState {
                operation,
                state: other.name(),
            }),
        }
    }

    /// Transformed trades held for review (empty outside preview).
    pub fn trades(&self) -> &[ExtractedTrade] {
        match &self.state {
            WorkflowState::Preview { trades, .. } => trades,
            _ => &[],
        }
    }

    pub fn selected_count(&self) -> usize {
        match &self.state {
            WorkflowState::Preview { selected, .. } => {
                selected.iter().filter(|flag| **flag).count()
            }
            _ => 0,
        }
    }

    /// Commit the selected trades, each stamped with the resolved broker:
    /// the caller's override, else the template/mapping broker, else
    /// "unknown". Requires a non-empty selection.
    pub fn commit(&mut self, broker_override: Option<&str>) -> Result<usize, TradeportError> {
        match mem::replace(&mut self.state, WorkflowState::Upload) {
            WorkflowState::Preview {
                table,
                mapping,
                broker,
                trades,
                selected,
            } => {
                let chosen: Vec<ExtractedTrade> = trades
                    .iter()
                    .zip(&selected)
                    .filter(|(_, keep)| **keep)
                    .map(|(trade, _)| trade.clone())
                    .collect();

                if chosen.is_empty() {
                    self.state = WorkflowState::Preview {
                        table,
                        mapping,
                        broker,
                        trades,
                        selected,
                    };
                    return Err(TradeportError::EmptySelection);
                }

                let resolved = broker_override
                    .map(str::to_string)
                    .or_else(|| broker.clone())
                    .unwrap_or_else(|| "unknown".to_string());

                let stamped: Vec<ExtractedTrade> = chosen
                    .into_iter()
                    .map(|mut trade| {
                        trade.broker = resolved.clone();
                        trade
                    })
                    .collect();

                match self.trades.commit_trades(&stamped, &resolved) {
                    Ok(count) => {
                        info!(broker = %resolved, count, "import committed");
                        self.state = WorkflowState::Committed { count };
                        Ok(count)
                    }
                    Err(e) => {
                        self.state = WorkflowState::Preview {
                            table,
                            mapping,
                            broker,
                            trades,
                            selected,
                        };
                        Err(e)
                    }
                }
            }
            other => {
                let err = TradeportError::InvalidState {
                    operation: "commit",
                    state: other.name(),
                };
                self.state = other;
                Err(err)
            }
        }
    }

    /// Abandon the current file from any state.
    pub fn reset(&mut self) {
        self.state = WorkflowState::Upload;
    }

    fn enter_preview(
        &mut self,
        table: RawTable,
        mapping: FieldMapping,
        broker: Option<String>,
    ) {
        let trades = transform_table(&table, &mapping);
        let selected = vec![true; trades.len()];
        self.state = WorkflowState::Preview {
            table,
            mapping,
            broker,
            trades,
            selected,
        };
    }
}
