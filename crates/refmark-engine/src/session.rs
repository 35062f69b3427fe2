//! The user-action boundary.
//!
//! Every action runs under one bulk-edit guard. Recoverable failures end the
//! action with a message for the user and a registry rebuilt from the
//! document; broken invariants leave as errors.

use crate::backend::{BulkEdit, DocumentBackend};
use crate::error::{Error, InvariantError, Result};
use crate::frontend::Frontend;
use crate::model::{BibDatabase, CitationGroupId, VariantTag};
use crate::style::CitationStyle;
use crate::sync::{SyncOptions, SyncReport, insert_citation, resync};
use crate::transform::{merge_adjacent, separate_all};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Insert {
        keys: Vec<String>,
        page_infos: Vec<Option<String>>,
        variant: VariantTag,
    },
    /// Fold adjacent parenthetical groups
    Merge,
    /// Split groups into single citations
    Separate,
    /// Resync without structural changes
    Update,
    /// Look for overlapping markers and inconsistent data, change nothing
    CheckIntegrity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Inserted {
        id: CitationGroupId,
        report: SyncReport,
    },
    Synced(SyncReport),
    IntegrityOk,
    Failed {
        message: String,
    },
}

pub struct Session<B: DocumentBackend + Clone> {
    frontend: Frontend<B>,
    options: SyncOptions,
    style: Box<dyn CitationStyle>,
    databases: Vec<Box<dyn BibDatabase>>,
}

impl<B: DocumentBackend + Clone> Session<B> {
    pub fn open(
        backend: B,
        options: SyncOptions,
        style: Box<dyn CitationStyle>,
        databases: Vec<Box<dyn BibDatabase>>,
    ) -> Result<Self> {
        let frontend =
            Frontend::load(backend, options.payload_model, options.placeholders.clone())?;
        Ok(Self {
            frontend,
            options,
            style,
            databases,
        })
    }

    pub fn frontend(&self) -> &Frontend<B> {
        &self.frontend
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one user action.
    ///
    /// Recoverable errors become [`ActionOutcome::Failed`]; only broken
    /// invariants are returned as errors.
    pub fn run(&mut self, action: Action) -> std::result::Result<ActionOutcome, InvariantError> {
        let result = match BulkEdit::begin(self.frontend.backend().clone()) {
            Ok(_guard) => self.perform(action),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(outcome) => {
                log::info!("Action finished: {outcome:?}");
                Ok(outcome)
            }
            Err(Error::Invariant(e)) => Err(e),
            Err(Error::Document(e)) => {
                log::warn!("Action failed: {e}");
                self.rebuild()?;
                Ok(ActionOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    fn perform(&mut self, action: Action) -> Result<ActionOutcome> {
        let databases: Vec<&dyn BibDatabase> =
            self.databases.iter().map(|db| db.as_ref()).collect();
        let style = self.style.as_ref();

        match action {
            Action::Insert {
                keys,
                page_infos,
                variant,
            } => {
                let (id, report) = insert_citation(
                    &mut self.frontend,
                    &keys,
                    &page_infos,
                    variant,
                    style,
                    &databases,
                    &self.options,
                )?;
                Ok(ActionOutcome::Inserted { id, report })
            }
            Action::Merge => {
                merge_adjacent(&mut self.frontend)?;
                let report = resync(&mut self.frontend, style, &databases, &self.options)?;
                Ok(ActionOutcome::Synced(report))
            }
            Action::Separate => {
                separate_all(&mut self.frontend)?;
                let report = resync(&mut self.frontend, style, &databases, &self.options)?;
                Ok(ActionOutcome::Synced(report))
            }
            Action::Update => {
                let report = resync(&mut self.frontend, style, &databases, &self.options)?;
                Ok(ActionOutcome::Synced(report))
            }
            Action::CheckIntegrity => {
                let report = self.frontend.check_range_overlaps(
                    self.options.require_separation,
                    self.options.overlap_report_cap,
                )?;
                if !report.is_empty() {
                    return Err(crate::error::DocumentError::OverlapDetected(report).into());
                }
                self.frontend.groups().aggregate_cited_keys()?;
                Ok(ActionOutcome::IntegrityOk)
            }
        }
    }

    /// Rebuild the registry from the document after a failed action.
    ///
    /// If the document cannot be read the old registry is kept; the next
    /// action will fail the same way.
    fn rebuild(&mut self) -> std::result::Result<(), InvariantError> {
        let backend = self.frontend.backend().clone();
        let placeholders = self.options.placeholders.clone();
        match Frontend::load(backend, self.options.payload_model, placeholders) {
            Ok(frontend) => {
                self.frontend = frontend;
                Ok(())
            }
            Err(Error::Invariant(e)) => Err(e),
            Err(Error::Document(e)) => {
                log::warn!("Could not rebuild citation registry: {e}");
                Ok(())
            }
        }
    }

    /// Switch to a new connection to the document, discarding the registry
    pub fn reconnect(&mut self, backend: B) -> Result<()> {
        let placeholders = self.options.placeholders.clone();
        self.frontend = Frontend::load(backend, self.options.payload_model, placeholders)?;
        log::info!("Reconnected, {} citation groups", self.frontend.groups().len());
        Ok(())
    }
}
