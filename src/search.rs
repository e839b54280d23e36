use anyhow::{Context, Result, bail};
use log::debug;

use crate::{
    cli::SearchArgs,
    classify::AttributeKind,
    registry::Registry,
    store::{AttributeId, EavStore, NumericFilter, SearchHit},
    table,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeQuery {
    /// Every run that has a value for the attribute.
    All,
    Contains(String),
    Range(NumericFilter),
}

impl AttributeQuery {
    pub fn from_args(args: &SearchArgs) -> Self {
        let filter = NumericFilter {
            min: args.min,
            max: args.max,
            equals: args.equals,
        };
        match &args.contains {
            Some(needle) => AttributeQuery::Contains(needle.clone()),
            None if filter == NumericFilter::default() => AttributeQuery::All,
            None => AttributeQuery::Range(filter),
        }
    }
}

/// Finds the dictionary an attribute name lives in.
pub fn resolve_attribute(store: &EavStore, name: &str) -> Result<(AttributeKind, AttributeId)> {
    let registry = Registry::from_store(store).context("Reading attribute dictionary")?;
    for kind in [AttributeKind::String, AttributeKind::Numeric] {
        if let Ok(id) = registry.lookup(name, kind) {
            debug!("Attribute '{name}' resolved to {kind} id {id}");
            return Ok((kind, id));
        }
    }
    bail!("Attribute '{name}' is not registered")
}

pub fn search(
    store: &EavStore,
    attribute: &str,
    query: &AttributeQuery,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let (kind, id) = resolve_attribute(store, attribute)?;
    let hits = match (kind, query) {
        (AttributeKind::String, AttributeQuery::Contains(needle)) => {
            store.search_text(id, needle, limit)?
        }
        (AttributeKind::String, AttributeQuery::All) => store.search_text(id, "", limit)?,
        (AttributeKind::Numeric, AttributeQuery::All) => {
            store.search_numeric(id, NumericFilter::default(), limit)?
        }
        (AttributeKind::Numeric, AttributeQuery::Range(filter)) => {
            store.search_numeric(id, *filter, limit)?
        }
        (AttributeKind::String, AttributeQuery::Range(_)) => {
            bail!("'{attribute}' is a string attribute; use --contains")
        }
        (AttributeKind::Numeric, AttributeQuery::Contains(_)) => {
            bail!("'{attribute}' is a numeric attribute; use --min, --max or --equals")
        }
    };
    Ok(hits)
}

pub fn execute(args: &SearchArgs) -> Result<()> {
    let store = crate::open_existing_store(&args.db)?;
    let query = AttributeQuery::from_args(args);
    let hits = search(&store, &args.attribute, &query, args.limit)?;
    if args.json {
        let json = serde_json::to_string_pretty(&hits).context("Serializing search results")?;
        println!("{json}");
        return Ok(());
    }
    let headers = vec![
        "run_id".to_string(),
        "timestamp".to_string(),
        args.attribute.clone(),
    ];
    let rows = hits
        .iter()
        .map(|hit| {
            vec![
                hit.run_id.to_string(),
                hit.timestamp.clone().unwrap_or_default(),
                hit.value.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::RunId, store::StoredValue};

    fn seeded_store() -> EavStore {
        let store = EavStore::open_in_memory().unwrap();
        let customer = store
            .upsert_attribute(AttributeKind::String, "customer")
            .unwrap();
        let viscosity = store
            .upsert_attribute(AttributeKind::Numeric, "viscosity")
            .unwrap();
        let mut batch = store.begin_batch().unwrap();
        for (run, name, value) in [(1, "kmart", 40.0), (2, "sears", 52.0), (3, "kmart", 60.0)] {
            batch.insert_run(RunId(run), None).unwrap();
            batch.insert_text(RunId(run), customer, name).unwrap();
            batch.insert_number(RunId(run), viscosity, value).unwrap();
        }
        batch.commit().unwrap();
        store
    }

    #[test]
    fn string_and_numeric_queries_dispatch_by_kind() {
        let store = seeded_store();
        let hits = search(
            &store,
            "customer",
            &AttributeQuery::Contains("kma".into()),
            100,
        )
        .unwrap();
        assert_eq!(hits.len(), 2);

        let filter = NumericFilter {
            equals: Some(52.0),
            ..NumericFilter::default()
        };
        let hits = search(&store, "viscosity", &AttributeQuery::Range(filter), 100).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, StoredValue::Number(52.0));
    }

    #[test]
    fn query_without_filters_lists_every_run_for_either_kind() {
        let store = seeded_store();
        let hits = search(&store, "customer", &AttributeQuery::All, 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.run_id).collect::<Vec<_>>(), vec![1, 2]);
        let hits = search(&store, "viscosity", &AttributeQuery::All, 100).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn arguments_select_the_query_shape() {
        let mut args = SearchArgs {
            db: "runs.db".into(),
            attribute: "customer".into(),
            contains: None,
            min: None,
            max: None,
            equals: None,
            limit: 100,
            json: false,
        };
        assert_eq!(AttributeQuery::from_args(&args), AttributeQuery::All);
        args.min = Some(45.0);
        assert!(matches!(
            AttributeQuery::from_args(&args),
            AttributeQuery::Range(NumericFilter { min: Some(_), .. })
        ));
        args.min = None;
        args.contains = Some("mart".into());
        assert_eq!(
            AttributeQuery::from_args(&args),
            AttributeQuery::Contains("mart".into())
        );
    }

    #[test]
    fn mismatched_query_and_unknown_attribute_fail() {
        let store = seeded_store();
        assert!(search(&store, "viscosity", &AttributeQuery::Contains("4".into()), 10).is_err());
        let filter = NumericFilter {
            min: Some(1.0),
            ..NumericFilter::default()
        };
        assert!(search(&store, "customer", &AttributeQuery::Range(filter), 10).is_err());
        assert!(resolve_attribute(&store, "humidity").is_err());
    }
}
