/// Result of one harvest cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// The cycle's fetch returned this many items.
    Fetched(usize),
    /// Nothing obtained: empty fetch, nothing queued, or a lost race. Try again later.
    Nothing,
}

impl HarvestOutcome {
    /// Integer form: the item count, or `-1` when nothing was obtained.
    pub fn code(&self) -> i64 {
        match self {
            HarvestOutcome::Fetched(n) => *n as i64,
            HarvestOutcome::Nothing => -1,
        }
    }
}

impl From<HarvestOutcome> for i64 {
    fn from(o: HarvestOutcome) -> Self {
        o.code()
    }
}
