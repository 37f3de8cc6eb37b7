use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::ProgressBar;

use crate::facets::{self, FacetSet};
use crate::financials::{self, EnrichOptions, EnrichedRecord, StatementSource};
use crate::registry::{EntitySource, FilterCriteria};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SortField {
    Name,
    Employees,
    Revenue,
    OperatingResult,
    Equity,
    TotalAssets,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "employees" => Some(Self::Employees),
            "revenue" => Some(Self::Revenue),
            "operating-result" | "operating_result" | "result" => Some(Self::OperatingResult),
            "equity" => Some(Self::Equity),
            "assets" | "total-assets" | "total_assets" => Some(Self::TotalAssets),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Employees,
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loaded,
    Failed(String),
}

// The working set for one load cycle. `all` is the enriched superset in
// load order; `records` is the locally filtered and sorted view over it.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    all: Vec<EnrichedRecord>,
    records: Vec<EnrichedRecord>,
    criteria: FilterCriteria,
    sort: SortSpec,
    page: usize,
}

fn numeric_key(record: &EnrichedRecord, field: SortField) -> Option<i64> {
    match field {
        SortField::Name => None,
        SortField::Employees => Some(i64::from(record.entity.employees)),
        SortField::Revenue => record.financials.and_then(|f| f.revenue),
        SortField::OperatingResult => record.financials.and_then(|f| f.operating_result),
        SortField::Equity => record.financials.and_then(|f| f.equity),
        SortField::TotalAssets => record.financials.and_then(|f| f.total_assets),
    }
}

fn matches_criteria(record: &EnrichedRecord, criteria: &FilterCriteria) -> bool {
    let name = criteria.name.trim();
    if !name.is_empty()
        && !record
            .entity
            .name
            .to_lowercase()
            .contains(&name.to_lowercase())
    {
        return false;
    }
    if record.entity.employees < criteria.min_employees {
        return false;
    }
    if criteria.min_revenue > 0 {
        // Absent revenue never passes a positive threshold.
        match record.financials.and_then(|f| f.revenue) {
            Some(revenue) if revenue >= criteria.min_revenue => {}
            _ => return false,
        }
    }
    let industry = criteria.industry_code.trim();
    if !industry.is_empty() && record.entity.industry_code != industry {
        return false;
    }
    let legal_form = criteria.legal_form.trim();
    if !legal_form.is_empty() && record.entity.legal_form != legal_form {
        return false;
    }
    true
}

impl Collection {
    pub fn all(&self) -> &[EnrichedRecord] {
        &self.all
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self, page_size: usize) -> usize {
        let page_size = page_size.max(1);
        std::cmp::max(1, self.records.len().div_ceil(page_size))
    }

    pub(crate) fn replace(&mut self, all: Vec<EnrichedRecord>, criteria: FilterCriteria) {
        self.all = all;
        self.criteria = criteria;
        self.sort = SortSpec::default();
        self.refilter();
        self.page = 1;
    }

    pub(crate) fn apply_filter(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.refilter();
        self.page = 1;
    }

    pub(crate) fn sort_by(&mut self, field: SortField) {
        self.sort = if self.sort.field == field {
            SortSpec {
                field,
                direction: self.sort.direction.flipped(),
            }
        } else {
            SortSpec {
                field,
                direction: SortDirection::Descending,
            }
        };
        self.resort();
        self.page = 1;
    }

    pub(crate) fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
        self.resort();
        self.page = 1;
    }

    pub(crate) fn set_page(&mut self, page: usize, page_size: usize) {
        self.page = page.clamp(1, self.total_pages(page_size));
    }

    fn refilter(&mut self) {
        let criteria = self.criteria.clone();
        self.records = self
            .all
            .iter()
            .filter(|record| matches_criteria(record, &criteria))
            .cloned()
            .collect();
        self.resort();
    }

    // Vec::sort_by is stable, so equal keys keep their load order. For
    // numeric fields None < Some, which ranks absent values first under
    // ascending and last under descending.
    fn resort(&mut self) {
        let SortSpec { field, direction } = self.sort;
        match field {
            SortField::Name => match direction {
                SortDirection::Ascending => self
                    .records
                    .sort_by(|a, b| a.entity.name.to_lowercase().cmp(&b.entity.name.to_lowercase())),
                SortDirection::Descending => self
                    .records
                    .sort_by(|a, b| b.entity.name.to_lowercase().cmp(&a.entity.name.to_lowercase())),
            },
            _ => match direction {
                SortDirection::Ascending => self
                    .records
                    .sort_by(|a, b| numeric_key(a, field).cmp(&numeric_key(b, field))),
                SortDirection::Descending => self
                    .records
                    .sort_by(|a, b| numeric_key(b, field).cmp(&numeric_key(a, field))),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub limit: usize,
    pub page_size: usize,
    pub large_company_threshold: u32,
    pub enrich: EnrichOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            page_size: 20,
            large_company_threshold: 1000,
            enrich: EnrichOptions::default(),
        }
    }
}

#[derive(Debug, Default)]
struct PipelineInner {
    state: LoadState,
    collection: Collection,
    facets: FacetSet,
}

// Owns the collection. Facet extraction and view building only ever read
// through the accessors below; every mutation goes through load/apply_filter/
// sort_by/set_page so the page-clamp invariant holds after each one.
#[derive(Debug)]
pub struct Pipeline<R, F> {
    registry: R,
    financials: F,
    options: PipelineOptions,
    inner: Arc<Mutex<PipelineInner>>,
    cycle: Arc<AtomicU64>,
    progress: ProgressBar,
}

impl<R, F> Pipeline<R, F>
where
    R: EntitySource + Sync,
    F: StatementSource + Sync,
{
    pub fn new(registry: R, financials: F, options: PipelineOptions) -> Self {
        Self {
            registry,
            financials,
            options,
            inner: Arc::new(Mutex::new(PipelineInner::default())),
            cycle: Arc::new(AtomicU64::new(0)),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    // Fetch, enrich, then commit as the new collection. A load that was
    // superseded by a newer cycle while in flight commits nothing, not even
    // its failure state.
    pub async fn load(&self, criteria: FilterCriteria) -> LoadState {
        let token = self.begin_cycle();

        let fetched = self
            .registry
            .fetch_entities(&criteria, self.options.limit)
            .await;

        let entities = match fetched {
            Ok(entities) => entities,
            Err(e) => {
                let mut inner = self.lock_inner();
                if self.is_current(token) {
                    inner.state = LoadState::Failed(e.to_string());
                    inner.collection = Collection::default();
                    inner.facets = FacetSet::default();
                }
                return inner.state.clone();
            }
        };

        self.progress.set_length(entities.len() as u64);
        let enriched =
            financials::enrich(&self.financials, entities, &self.options.enrich, &self.progress)
                .await;

        let mut inner = self.lock_inner();
        if self.is_current(token) {
            inner.collection.replace(enriched, criteria);
            let derived = facets::extract_facets(inner.collection.all());
            inner.facets = derived;
            inner.state = LoadState::Loaded;
        }
        inner.state.clone()
    }

    // Local strategy: the superset loaded by `load` is re-filtered in memory.
    // Also invalidates any load still in flight so a stale cycle cannot
    // overwrite the newly filtered view.
    pub fn apply_filter(&self, criteria: FilterCriteria) {
        self.begin_cycle();
        self.lock_inner().collection.apply_filter(criteria);
    }

    pub fn sort_by(&self, field: SortField) {
        self.lock_inner().collection.sort_by(field);
    }

    // Non-toggling variant for callers that know the direction they want.
    pub fn set_sort(&self, sort: SortSpec) {
        self.lock_inner().collection.set_sort(sort);
    }

    pub fn set_page(&self, page: usize) {
        let page_size = self.options.page_size;
        self.lock_inner().collection.set_page(page, page_size);
    }

    pub fn state(&self) -> LoadState {
        self.lock_inner().state.clone()
    }

    pub fn facets(&self) -> FacetSet {
        self.lock_inner().facets.clone()
    }

    pub fn view(&self) -> crate::view::ViewModel {
        let inner = self.lock_inner();
        crate::view::build(
            &inner.collection,
            &inner.state,
            self.options.page_size,
            self.options.large_company_threshold,
        )
    }

    pub fn with_collection<T>(&self, f: impl FnOnce(&Collection) -> T) -> T {
        f(&self.lock_inner().collection)
    }

    fn begin_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, token: u64) -> bool {
        self.cycle.load(Ordering::SeqCst) == token
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, PipelineInner> {
        // The lock is never held across an await and the closures passed in
        // cannot poison it short of panicking mid-read.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
