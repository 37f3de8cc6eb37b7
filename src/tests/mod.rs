use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::financials::{EnrichOptions, FinancialSummary, StatementSource};
use crate::pipeline::{LoadState, Pipeline, PipelineOptions, SortField};
use crate::registry::{EntityRecord, EntitySource, FilterCriteria, RegistryError};
use crate::view::ViewModel;

fn entity(org: &str, name: &str, employees: u32, industry: &str) -> EntityRecord {
    EntityRecord {
        org_number: org.to_string(),
        name: name.to_string(),
        employees,
        industry_code: industry.to_string(),
        industry_label: format!("industry {industry}"),
        legal_form: "AS".to_string(),
        city: "OSLO".to_string(),
    }
}

#[derive(Debug, Default)]
struct FakeRegistry {
    records: Vec<EntityRecord>,
    fail: bool,
    // Name criterion that makes this fetch stall, to simulate a slow cycle.
    slow_name: Option<String>,
    slow_records: Vec<EntityRecord>,
}

impl EntitySource for FakeRegistry {
    async fn fetch_entities(
        &self,
        criteria: &FilterCriteria,
        _limit: usize,
    ) -> Result<Vec<EntityRecord>, RegistryError> {
        if self.fail {
            return Err(RegistryError::Parse {
                message: "upstream shape changed".to_string(),
            });
        }
        if self.slow_name.as_deref() == Some(criteria.name.as_str()) {
            tokio::time::sleep(Duration::from_millis(80)).await;
            return Ok(self.slow_records.clone());
        }
        Ok(self.records.clone())
    }
}

#[derive(Debug, Default)]
struct FakeFinancials {
    summaries: HashMap<String, FinancialSummary>,
    failing: HashSet<String>,
}

impl FakeFinancials {
    fn with_revenue(orgs: &[(&str, i64)]) -> Self {
        let mut summaries = HashMap::new();
        for (org, revenue) in orgs {
            summaries.insert(
                org.to_string(),
                FinancialSummary {
                    fiscal_year: Some(2023),
                    revenue: Some(*revenue),
                    ..Default::default()
                },
            );
        }
        Self {
            summaries,
            failing: HashSet::new(),
        }
    }
}

impl StatementSource for FakeFinancials {
    async fn fetch_statement(&self, org_number: &str) -> Option<FinancialSummary> {
        if self.failing.contains(org_number) {
            return None;
        }
        self.summaries.get(org_number).copied()
    }
}

fn unpaced_options() -> PipelineOptions {
    PipelineOptions {
        enrich: EnrichOptions {
            rate: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn load_enriches_and_derives_facets() {
    let registry = FakeRegistry {
        records: vec![
            entity("1", "BDO AS", 1288, "69.201"),
            entity("2", "BDO ADVOKATER AS", 84, "69.100"),
        ],
        ..Default::default()
    };
    let financials = FakeFinancials::with_revenue(&[("1", 3_200_000_000), ("2", 150_000_000)]);
    let pipeline = Pipeline::new(registry, financials, unpaced_options());

    let state = pipeline.load(FilterCriteria::default()).await;
    assert_eq!(state, LoadState::Loaded);

    let facets = pipeline.facets();
    assert_eq!(facets.industries.len(), 2);

    let ViewModel::Loaded(page) = pipeline.view() else {
        panic!("expected loaded view");
    };
    assert_eq!(page.total_count, 2);
    assert_eq!(page.rows[0].entity.org_number, "1");
    assert_eq!(
        page.rows[0].financials.and_then(|f| f.revenue),
        Some(3_200_000_000)
    );
}

#[tokio::test]
async fn enrichment_failures_are_isolated_per_record() {
    let records: Vec<EntityRecord> = (1..=10)
        .map(|i| entity(&i.to_string(), &format!("org {i}"), i, "69.201"))
        .collect();
    let mut financials = FakeFinancials::default();
    for i in 1..=10u32 {
        financials.summaries.insert(
            i.to_string(),
            FinancialSummary {
                fiscal_year: Some(2023),
                revenue: Some(i64::from(i)),
                ..Default::default()
            },
        );
    }
    financials.failing.insert("3".to_string());
    financials.failing.insert("7".to_string());

    let registry = FakeRegistry {
        records,
        ..Default::default()
    };
    let pipeline = Pipeline::new(registry, financials, unpaced_options());

    let state = pipeline.load(FilterCriteria::default()).await;
    assert_eq!(state, LoadState::Loaded);

    pipeline.with_collection(|collection| {
        let with_summary = collection
            .all()
            .iter()
            .filter(|r| r.financials.is_some())
            .count();
        let without_summary = collection
            .all()
            .iter()
            .filter(|r| r.financials.is_none())
            .count();
        assert_eq!(with_summary, 8);
        assert_eq!(without_summary, 2);
    });
}

#[tokio::test]
async fn end_to_end_min_employees_scenario() {
    let registry = FakeRegistry {
        records: vec![
            entity("993606650", "BDO AS", 1288, "69.201"),
            entity("996449318", "BDO ADVOKATER AS", 84, "69.100"),
        ],
        ..Default::default()
    };
    let financials = FakeFinancials::default();
    let pipeline = Pipeline::new(registry, financials, unpaced_options());

    let criteria = FilterCriteria {
        min_employees: 1000,
        ..Default::default()
    };
    let state = pipeline.load(criteria).await;
    assert_eq!(state, LoadState::Loaded);

    let ViewModel::Loaded(page) = pipeline.view() else {
        panic!("expected loaded view");
    };
    assert_eq!(page.total_count, 1);
    assert_eq!(page.rows[0].entity.org_number, "993606650");
    assert_eq!(page.summary.total_companies, 1);
    assert_eq!(page.summary.large_companies, 1);
}

#[tokio::test]
async fn failed_load_surfaces_failed_state_and_clears_rows() {
    let ok_registry = FakeRegistry {
        records: vec![entity("1", "BDO AS", 1288, "69.201")],
        ..Default::default()
    };
    let pipeline = Pipeline::new(ok_registry, FakeFinancials::default(), unpaced_options());
    pipeline.load(FilterCriteria::default()).await;
    assert_eq!(pipeline.state(), LoadState::Loaded);

    // Same pipeline semantics, now against a failing upstream.
    let failing = FakeRegistry {
        fail: true,
        ..Default::default()
    };
    let pipeline = Pipeline::new(failing, FakeFinancials::default(), unpaced_options());
    let state = pipeline.load(FilterCriteria::default()).await;
    assert!(matches!(state, LoadState::Failed(_)));
    assert!(matches!(pipeline.view(), ViewModel::Failed { .. }));
    pipeline.with_collection(|collection| {
        assert!(collection.all().is_empty());
        assert!(collection.records().is_empty());
    });
}

#[tokio::test]
async fn stale_cycle_does_not_overwrite_newer_load() {
    let registry = FakeRegistry {
        records: vec![entity("fast", "Fast AS", 10, "69.201")],
        slow_name: Some("slow".to_string()),
        slow_records: vec![entity("slow", "Slow AS", 99, "69.100")],
        ..Default::default()
    };
    let pipeline = Arc::new(Pipeline::new(
        registry,
        FakeFinancials::default(),
        unpaced_options(),
    ));

    let slow = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .load(FilterCriteria {
                    name: "slow".to_string(),
                    ..Default::default()
                })
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    let fast_state = pipeline.load(FilterCriteria::default()).await;
    assert_eq!(fast_state, LoadState::Loaded);

    slow.await.unwrap();

    pipeline.with_collection(|collection| {
        let orgs: Vec<&str> = collection
            .all()
            .iter()
            .map(|r| r.entity.org_number.as_str())
            .collect();
        assert_eq!(orgs, vec!["fast"]);
        assert_eq!(collection.criteria().name, "");
    });
    assert_eq!(pipeline.state(), LoadState::Loaded);
}

#[tokio::test]
async fn stale_failure_does_not_mark_newer_load_failed() {
    // The slow cycle fails after the fast cycle already committed; the
    // failure belongs to a superseded cycle and must be discarded.
    #[derive(Debug)]
    struct SlowFailingRegistry {
        records: Vec<EntityRecord>,
    }

    impl EntitySource for SlowFailingRegistry {
        async fn fetch_entities(
            &self,
            criteria: &FilterCriteria,
            _limit: usize,
        ) -> Result<Vec<EntityRecord>, RegistryError> {
            if criteria.name == "doomed" {
                tokio::time::sleep(Duration::from_millis(80)).await;
                return Err(RegistryError::Parse {
                    message: "late failure".to_string(),
                });
            }
            Ok(self.records.clone())
        }
    }

    let pipeline = Arc::new(Pipeline::new(
        SlowFailingRegistry {
            records: vec![entity("1", "Fast AS", 10, "69.201")],
        },
        FakeFinancials::default(),
        unpaced_options(),
    ));

    let doomed = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .load(FilterCriteria {
                    name: "doomed".to_string(),
                    ..Default::default()
                })
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    pipeline.load(FilterCriteria::default()).await;
    doomed.await.unwrap();

    assert_eq!(pipeline.state(), LoadState::Loaded);
    pipeline.with_collection(|collection| assert_eq!(collection.all().len(), 1));
}

#[tokio::test]
async fn apply_filter_supersedes_in_flight_load() {
    let registry = FakeRegistry {
        records: vec![entity("fast", "Fast AS", 10, "69.201")],
        slow_name: Some("slow".to_string()),
        slow_records: vec![entity("slow", "Slow AS", 99, "69.100")],
        ..Default::default()
    };
    let pipeline = Arc::new(Pipeline::new(
        registry,
        FakeFinancials::default(),
        unpaced_options(),
    ));

    pipeline.load(FilterCriteria::default()).await;

    let slow = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .load(FilterCriteria {
                    name: "slow".to_string(),
                    ..Default::default()
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    pipeline.apply_filter(FilterCriteria {
        min_employees: 5,
        ..Default::default()
    });
    slow.await.unwrap();

    // The locally filtered view stands; the stale load never committed.
    pipeline.with_collection(|collection| {
        assert_eq!(collection.all().len(), 1);
        assert_eq!(collection.all()[0].entity.org_number, "fast");
        assert_eq!(collection.criteria().min_employees, 5);
    });
}

#[tokio::test]
async fn sort_and_paging_flow_over_loaded_collection() {
    let registry = FakeRegistry {
        records: vec![
            entity("1", "Alpha", 30, "a"),
            entity("2", "Beta", 20, "b"),
            entity("3", "Gamma", 10, "c"),
        ],
        ..Default::default()
    };
    let financials = FakeFinancials::with_revenue(&[("1", 100), ("3", 300)]);
    let options = PipelineOptions {
        page_size: 2,
        ..unpaced_options()
    };
    let pipeline = Pipeline::new(registry, financials, options);
    pipeline.load(FilterCriteria::default()).await;

    pipeline.sort_by(SortField::Revenue);
    let ViewModel::Loaded(page) = pipeline.view() else {
        panic!("expected loaded view");
    };
    // Descending revenue: 300, 100, then the record with no statement.
    assert_eq!(page.rows[0].entity.org_number, "3");
    assert_eq!(page.rows[1].entity.org_number, "1");

    pipeline.set_page(99);
    let ViewModel::Loaded(page) = pipeline.view() else {
        panic!("expected loaded view");
    };
    assert_eq!(page.page, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].entity.org_number, "2");
}
