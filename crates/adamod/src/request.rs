//! Resolved run request: what to select, what to change, and how.

use adamod_adabas::Isn;

use crate::error::ConfigProblem;

/// ISN buffer entries per `S1` call when nothing else is configured.
pub const DEFAULT_PAGE_CAPACITY: u16 = 1000;

/// Largest page whose ISN buffer length still fits the control block.
pub const MAX_PAGE_CAPACITY: u16 = 16383;

// ── Target ─────────────────────────────────────────────────────────

/// Database and file a run addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Database id (≥ 1).
    pub db_id: u16,
    /// File number (≥ 1).
    pub file_number: u16,
}

impl Target {
    /// Build a target, rejecting zero ids.
    pub fn new(db_id: u16, file_number: u16) -> Result<Self, ConfigProblem> {
        if db_id == 0 {
            return Err(ConfigProblem::NoDatabase);
        }
        if file_number == 0 {
            return Err(ConfigProblem::NoFile);
        }
        Ok(Self { db_id, file_number })
    }

    /// Parse a `-t` value: `db,file`, `db,`, `,file` or `db`.
    ///
    /// Returns the parts that were given; missing parts are filled from
    /// configuration by the caller.
    pub fn parse_override(arg: &str) -> Result<(Option<u16>, Option<u16>), ConfigProblem> {
        let invalid = || ConfigProblem::InvalidTarget(arg.to_string());
        let parse = |part: &str| -> Result<Option<u16>, ConfigProblem> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            match part.parse::<u16>() {
                Ok(n) if n > 0 => Ok(Some(n)),
                _ => Err(invalid()),
            }
        };

        let (db, file) = match arg.split_once(',') {
            Some((db, file)) => (parse(db)?, parse(file)?),
            None => (parse(arg)?, None),
        };
        if db.is_none() && file.is_none() {
            return Err(invalid());
        }
        Ok((db, file))
    }
}

// ── Buffers from arguments ─────────────────────────────────────────

/// Split `"<buffer>.<data>"` at the first `.`; the buffer keeps its `.`.
fn split_at_delimiter(arg: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let dot = arg.find('.')?;
    if dot == 0 {
        return None;
    }
    let (buffer, data) = arg.as_bytes().split_at(dot + 1);
    Some((buffer.to_vec(), data.to_vec()))
}

/// A search buffer and the value buffer it reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriterion {
    /// Search buffer, including the terminating `.`.
    pub search_buffer: Vec<u8>,
    /// Value buffer.
    pub value_buffer: Vec<u8>,
}

impl SearchCriterion {
    /// Parse `-s <search>.<value>`.
    pub fn parse(arg: &str) -> Result<Self, ConfigProblem> {
        let (search_buffer, value_buffer) =
            split_at_delimiter(arg).ok_or_else(|| ConfigProblem::InvalidSearch(arg.to_string()))?;
        Ok(Self {
            search_buffer,
            value_buffer,
        })
    }
}

/// The change applied to every selected record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Overwrite fields (`A1`).
    Update {
        /// Format buffer, including the terminating `.`.
        format_buffer: Vec<u8>,
        /// Record buffer.
        record_buffer: Vec<u8>,
    },
    /// Delete the record (`E1`).
    Delete,
}

impl Mutation {
    /// Parse `-m <format>.<record>`.
    pub fn update(arg: &str) -> Result<Self, ConfigProblem> {
        let (format_buffer, record_buffer) =
            split_at_delimiter(arg).ok_or_else(|| ConfigProblem::InvalidModify(arg.to_string()))?;
        Ok(Self::Update {
            format_buffer,
            record_buffer,
        })
    }
}

/// How records are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One known ISN.
    ByIdentifier(Isn),
    /// Every record matching a search.
    BySearch(SearchCriterion),
    /// Every record in physical order.
    FullScan,
}

impl Selection {
    /// Selection from optional `-i` / `-s` arguments; neither means a full scan.
    pub fn from_args(isn: Option<u64>, search: Option<&str>) -> Result<Self, ConfigProblem> {
        match (isn, search) {
            (Some(_), Some(_)) => Err(ConfigProblem::InvalidArgument(
                "an ISN and a search argument cannot be combined".to_string(),
            )),
            (Some(isn), None) => Isn::try_from(isn)
                .ok()
                .filter(|&isn| isn > 0)
                .map(Self::ByIdentifier)
                .ok_or(ConfigProblem::InvalidIsn),
            (None, Some(arg)) => SearchCriterion::parse(arg).map(Self::BySearch),
            (None, None) => Ok(Self::FullScan),
        }
    }
}

/// Check a page capacity against the ISN buffer limits.
pub fn validate_page_capacity(capacity: u32) -> Result<u16, ConfigProblem> {
    u16::try_from(capacity)
        .ok()
        .filter(|&c| (1..=MAX_PAGE_CAPACITY).contains(&c))
        .ok_or(ConfigProblem::InvalidPageSize(capacity))
}

// ── RunRequest ─────────────────────────────────────────────────────

/// Everything the engine needs for one run; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Database and file.
    pub target: Target,
    /// Record selection strategy.
    pub selection: Selection,
    /// Change applied per record.
    pub mutation: Mutation,
    /// Select but do not mutate.
    pub dry_run: bool,
    /// 0 silent, 1 summaries and dumps, 2 running count, 3 ISN trace.
    pub verbosity: u8,
    /// ISN buffer entries per `S1` call.
    pub page_capacity: u16,
}

impl RunRequest {
    /// A request with default page capacity, verbosity 0 and no dry run.
    pub fn new(target: Target, selection: Selection, mutation: Mutation) -> Self {
        Self {
            target,
            selection,
            mutation,
            dry_run: false,
            verbosity: 0,
            page_capacity: DEFAULT_PAGE_CAPACITY,
        }
    }

    /// Enable or disable dry-run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the verbosity level.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the page capacity (validated).
    pub fn with_page_capacity(mut self, capacity: u32) -> Result<Self, ConfigProblem> {
        self.page_capacity = validate_page_capacity(capacity)?;
        Ok(self)
    }
}
