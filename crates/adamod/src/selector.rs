//! Record selection: one ISN, search pages, or a physical scan.

use adamod_adabas::{CallBuffers, CommandCode, ControlBlock, DirectCall, Isn};
use tracing::{debug, info, warn};

use crate::error::{AdamodError, ConfigProblem};
use crate::output::Output;
use crate::request::{validate_page_capacity, SearchCriterion, Selection};
use crate::session::Session;

/// Command id shared by the `S1` and `L2` sequences of a run.
pub const COMMAND_ID: [u8; 4] = *b"AMOD";

/// Format buffer requesting no field data.
const EMPTY_FORMAT: &[u8] = b".";

/// A forward-only, non-restartable sequence of ISNs.
#[derive(Debug)]
pub struct RecordSelector {
    strategy: Strategy,
}

#[derive(Debug)]
enum Strategy {
    Identifier(Option<Isn>),
    Search(SearchPager),
    Scan { exhausted: bool },
}

impl RecordSelector {
    /// Build the selector for a selection. `page_capacity` is only used by
    /// searches, which reject a capacity outside `1..=MAX_PAGE_CAPACITY`.
    pub fn new(selection: &Selection, page_capacity: u16) -> Result<Self, ConfigProblem> {
        let strategy = match selection {
            Selection::ByIdentifier(isn) => Strategy::Identifier(Some(*isn)),
            Selection::BySearch(criterion) => {
                let capacity = validate_page_capacity(u32::from(page_capacity))?;
                Strategy::Search(SearchPager::new(criterion.clone(), capacity))
            }
            Selection::FullScan => Strategy::Scan { exhausted: false },
        };
        Ok(Self { strategy })
    }

    /// Next ISN, or `None` when the sequence is exhausted.
    pub fn next_isn<C: DirectCall>(
        &mut self,
        session: &mut Session<C>,
        out: &mut Output<'_>,
    ) -> Result<Option<Isn>, AdamodError> {
        match &mut self.strategy {
            Strategy::Identifier(isn) => Ok(isn.take()),
            Strategy::Search(pager) => pager.next_isn(session, out),
            Strategy::Scan { exhausted } => {
                if *exhausted {
                    return Ok(None);
                }
                let next = scan_next(session, out)?;
                *exhausted = next.is_none();
                Ok(next)
            }
        }
    }

    /// ISN quantity of the first search page, once fetched.
    pub fn found(&self) -> Option<u32> {
        match &self.strategy {
            Strategy::Search(pager) => pager.found,
            _ => None,
        }
    }

    /// Number of `S1` pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        match &self.strategy {
            Strategy::Search(pager) => pager.pages,
            _ => 0,
        }
    }
}

// ── Search paging ──────────────────────────────────────────────────

#[derive(Debug)]
struct SearchPager {
    criterion: SearchCriterion,
    page: Vec<Isn>,
    delivered: usize,
    cursor: usize,
    last_isn: Isn,
    more: bool,
    pages: usize,
    found: Option<u32>,
}

impl SearchPager {
    fn new(criterion: SearchCriterion, page_capacity: u16) -> Self {
        Self {
            criterion,
            page: vec![0; usize::from(page_capacity)],
            delivered: 0,
            cursor: 0,
            last_isn: 0,
            more: true,
            pages: 0,
            found: None,
        }
    }

    fn next_isn<C: DirectCall>(
        &mut self,
        session: &mut Session<C>,
        out: &mut Output<'_>,
    ) -> Result<Option<Isn>, AdamodError> {
        loop {
            if self.cursor < self.delivered {
                let isn = self.page[self.cursor];
                self.cursor += 1;
                self.last_isn = isn;
                return Ok(Some(isn));
            }
            if !self.more {
                return Ok(None);
            }
            self.fetch(session, out)?;
        }
    }

    /// Request the next page of ISNs above the last one delivered.
    fn fetch<C: DirectCall>(
        &mut self,
        session: &mut Session<C>,
        out: &mut Output<'_>,
    ) -> Result<(), AdamodError> {
        let target = session.target();
        let capacity = self.page.len();
        let buffers = CallBuffers {
            format: EMPTY_FORMAT,
            search: &self.criterion.search_buffer,
            value: &self.criterion.value_buffer,
            isn: &mut self.page,
            ..CallBuffers::default()
        };
        let mut cb = ControlBlock::new(CommandCode::S1, target.db_id, target.file_number)
            .with_command_id(COMMAND_ID)
            .with_isn_lower_limit(self.last_isn)
            .with_buffer_lengths(&buffers);

        let response = session.exchange(&mut cb, buffers);
        if !response.is_normal() {
            out.dump(&cb);
            warn!(response = %response, lower_limit = self.last_isn, "search failed");
            return Err(AdamodError::Select { response });
        }

        let quantity = usize::try_from(cb.isn_quantity).unwrap_or(usize::MAX);
        self.delivered = quantity.min(capacity);
        self.cursor = 0;
        self.more = self.delivered == capacity;
        self.pages += 1;

        if self.found.is_none() {
            self.found = Some(cb.isn_quantity);
            out.status_line(1, format_args!("Found records: {}", cb.isn_quantity));
            info!(found = cb.isn_quantity, "search evaluated");
        }
        debug!(
            page = self.pages,
            delivered = self.delivered,
            lower_limit = self.last_isn,
            "search page fetched"
        );
        Ok(())
    }
}

// ── Physical scan ──────────────────────────────────────────────────

fn scan_next<C: DirectCall>(
    session: &mut Session<C>,
    out: &mut Output<'_>,
) -> Result<Option<Isn>, AdamodError> {
    let target = session.target();
    let buffers = CallBuffers {
        format: EMPTY_FORMAT,
        ..CallBuffers::default()
    };
    let mut cb = ControlBlock::new(CommandCode::L2, target.db_id, target.file_number)
        .with_command_id(COMMAND_ID)
        .with_buffer_lengths(&buffers);

    let response = session.exchange(&mut cb, buffers);
    if response.is_end_of_file() {
        debug!(file = target.file_number, "end of file");
        return Ok(None);
    }
    if !response.is_normal() {
        out.dump(&cb);
        warn!(response = %response, "physical read failed");
        return Err(AdamodError::Scan { response });
    }
    Ok(Some(cb.isn))
}
