//! Integration tests for the experiment repository.
//!
//! These tests load record files through a small test grammar, round-trip
//! the cache snapshot on disk with tempfile, and check selection and
//! aggregation over the result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tempfile::TempDir;

use synapdex::core::entry::{EntryId, EntryTree, ParseError};
use synapdex::core::experiment::{Cell, Experiment};
use synapdex::core::factory::RecordFactory;
use synapdex::core::types::{ExperimentId, TypePair};
use synapdex::store::{
    CacheError, Calcium, ExperimentList, LoadError, Selection, CACHE_VERSION,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Test grammar.
///
/// ```text
/// <key> <yyyy-mm-dd> [region=..] [age=..] [solution=..] [temp=..] [cre=..]
/// - cell <id> <cre> <x_um> <y_um> <z_um>
/// - conn <pre> <post>
/// - probed <pre> <post>
/// ```
struct NotesFactory;

fn source_name(tree: &EntryTree, entry: EntryId) -> String {
    tree[entry]
        .source()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inline".to_string())
}

fn pair(words: &[&str]) -> anyhow::Result<(u32, u32)> {
    match words {
        [_, pre, post] => Ok((pre.parse()?, post.parse()?)),
        _ => bail!("expected '<kind> <pre> <post>'"),
    }
}

impl RecordFactory for NotesFactory {
    fn id_from_entry(&self, tree: &EntryTree, entry: EntryId) -> anyhow::Result<ExperimentId> {
        let key = tree[entry]
            .head()
            .split_whitespace()
            .next()
            .context("empty entry")?;
        Ok(ExperimentId::new(source_name(tree, entry), key)?)
    }

    fn build(&self, tree: &EntryTree, entry: EntryId) -> anyhow::Result<Experiment> {
        let id = self.id_from_entry(tree, entry)?;
        let mut words = tree[entry].head().split_whitespace().skip(1);
        let date = words.next().context("missing date")?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{date}'"))?;

        let mut builder = Experiment::builder(id, date);
        for word in words {
            let (name, value) = word.split_once('=').context("expected name=value")?;
            builder = match name {
                "region" => builder.region(value),
                "age" => builder.age(value.parse()?),
                "solution" => builder.solution(value),
                "temp" => builder.temperature(value),
                "cre" => builder.cre_type(value),
                other => bail!("unknown field '{other}'"),
            };
        }

        for &child in tree[entry].children() {
            let words: Vec<&str> = tree[child].head().split_whitespace().collect();
            builder = match words.first().copied() {
                Some("cell") => {
                    let &[_, id, cre, x, y, z] = words.as_slice() else {
                        bail!("malformed cell line");
                    };
                    let um = |v: &str| -> anyhow::Result<f64> { Ok(v.parse::<f64>()? * 1e-6) };
                    builder.cell(
                        Cell::new(id.parse()?)
                            .cre_type(cre)
                            .position([um(x)?, um(y)?, um(z)?]),
                    )
                }
                Some("conn") => {
                    let (pre, post) = pair(&words)?;
                    builder.connected(pre, post)
                }
                Some("probed") => {
                    let (pre, post) = pair(&words)?;
                    builder.probed(pre, post)
                }
                _ => bail!("unknown line '{}'", tree[child].head()),
            };
        }
        Ok(builder.build()?)
    }
}

const NOTES: &str = "\
# lab notes
1 2017-03-01 region=V1 age=40 solution=2mM temp=34C cre=sst
- cell 1 sst 0 0 0
- cell 2 pvalb 50 0 0
- cell 3 pvalb 300 0 0
- conn 1 2
- probed 1 3

2 2017-05-01 region=V1 age=50 solution=1.3mM temp=25C cre=sst
- cell 1 sst 0 0 0
- cell 2 pvalb 80 0 0
- cell 3 pvalb 0 90 0
- conn 1 2
- conn 1 3

3 2017-07-01 region=A1 solution=2mM temp=34C cre=pvalb
- cell 1 pvalb 0 0 0
- cell 2 sst 20 0 0
- probed 1 2

4 not-a-date
- cell 1 sst 0 0 0
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    fn cache(&self) -> PathBuf {
        self.dir.path().join("expts.json")
    }

    /// Load the notes into a repository whose cache lives in the workspace.
    fn loaded(&self) -> ExperimentList {
        let notes = self.write("notes.txt", NOTES);
        let mut list = ExperimentList::new(Some(self.cache()));
        list.load(&notes, &NotesFactory).expect("load notes");
        list
    }
}

// =============================================================================
// Loading
// =============================================================================

mod loading {
    use super::*;

    #[test]
    fn partial_failures_are_collected() {
        let ws = Workspace::new();
        let notes = ws.write("notes.txt", NOTES);
        let mut list = ExperimentList::new(None);

        let report = list.load(&notes, &NotesFactory).unwrap();

        assert_eq!(report.loaded, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(list.len(), 3);
        assert!(report.failures[0].location.ends_with("notes.txt:21"));
        assert!(report.failures[0].content.starts_with("4 not-a-date"));
        assert!(format!("{:?}", report.failures[0].error).contains("invalid date"));
    }

    #[test]
    fn reload_skips_known_ids() {
        let ws = Workspace::new();
        let notes = ws.write("notes.txt", NOTES);
        let mut list = ExperimentList::new(None);
        list.load(&notes, &NotesFactory).unwrap();

        let report = list.load(&notes, &NotesFactory).unwrap();

        assert_eq!(report.loaded, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn ids_carry_source_file() {
        let list = Workspace::new().loaded();
        let id = ExperimentId::new("notes.txt", "2").unwrap();
        assert_eq!(list.position(&id), Some(1));
        assert_eq!(list[1].id, id);
    }

    #[test]
    fn unreadable_file_aborts() {
        let ws = Workspace::new();
        let mut list = ExperimentList::new(None);
        let result = list.load(&ws.dir.path().join("missing.txt"), &NotesFactory);
        assert!(matches!(result, Err(LoadError::Parse(ParseError::Read { .. }))));
        assert!(list.is_empty());
    }

    #[test]
    fn continuation_lines_stay_in_entry() {
        let ws = Workspace::new();
        let notes = ws.write(
            "notes.txt",
            "1 2017-01-01\n- cell 1 sst 0 0 0\n  (recorded twice)\n- cell 2 sst 10 0 0\n",
        );
        let tree = EntryTree::parse_file(&notes).unwrap();
        let top = tree.top_level()[0];
        assert_eq!(tree[top].children().len(), 2);
        assert_eq!(tree[tree[top].children()[0]].lines().len(), 2);

        let mut list = ExperimentList::new(None);
        let report = list.load(&notes, &NotesFactory).unwrap();
        assert!(report.is_clean());
        assert_eq!(list[0].cells.len(), 2);
    }
}

// =============================================================================
// Cache
// =============================================================================

mod cache {
    use super::*;

    #[test]
    fn save_reload_is_idempotent() {
        let ws = Workspace::new();
        let list = ws.loaded();
        list.write_cache().unwrap();

        let reloaded = ExperimentList::open(ws.cache());

        assert_eq!(reloaded.len(), list.len());
        assert_eq!(
            reloaded.connectivity_summary(None),
            list.connectivity_summary(None)
        );
        assert_eq!(reloaded.n_connections_probed(), list.n_connections_probed());
    }

    #[test]
    fn other_version_is_discarded() {
        let ws = Workspace::new();
        ws.loaded().write_cache().unwrap();

        let text = fs::read_to_string(ws.cache()).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&text).unwrap();
        json["schema_version"] = serde_json::json!(CACHE_VERSION + 1);
        fs::write(ws.cache(), json.to_string()).unwrap();

        let mut list = ExperimentList::new(None);
        let report = list.load(&ws.cache(), &NotesFactory).unwrap();
        assert!(matches!(
            report.discarded,
            Some(CacheError::VersionMismatch { .. })
        ));
        assert!(list.is_empty());

        let opened = ExperimentList::open(ws.cache());
        assert!(opened.is_empty());
        assert_eq!(opened.cache_path(), Some(ws.cache().as_path()));
    }

    #[test]
    fn destination_without_json_extension_reopens() {
        let ws = Workspace::new();
        let notes = ws.write("notes.txt", NOTES);
        let destination = ws.dir.path().join("expts.cache");

        let mut list = ExperimentList::new(Some(destination.clone()));
        list.load(&notes, &NotesFactory).unwrap();
        list.write_cache().unwrap();

        let reopened = ExperimentList::open(destination.clone());
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.cache_path(), Some(destination.as_path()));
        assert_eq!(
            reopened.connectivity_summary(None),
            list.connectivity_summary(None)
        );
    }

    #[test]
    fn corrupt_cache_opens_empty() {
        let ws = Workspace::new();
        ws.write("expts.json", "{ not json");

        let list = ExperimentList::open(ws.cache());
        assert!(list.is_empty());
        assert_eq!(list.cache_path(), Some(ws.cache().as_path()));
    }

    #[test]
    fn save_without_destination_fails() {
        let list = ExperimentList::new(None);
        assert!(matches!(list.write_cache(), Err(CacheError::NoDestination)));
    }

    #[test]
    fn cached_records_skip_text_reload() {
        let ws = Workspace::new();
        ws.loaded().write_cache().unwrap();

        let mut list = ExperimentList::open(ws.cache());
        let notes = ws.write("notes.txt", NOTES);
        let report = list.load(&notes, &NotesFactory).unwrap();

        assert_eq!(report.skipped, 3);
        assert_eq!(list.len(), 3);
    }
}

// =============================================================================
// Selection
// =============================================================================

mod selection {
    use super::*;

    fn keys(list: &ExperimentList) -> Vec<String> {
        list.iter().map(|e| e.id.key().to_string()).collect()
    }

    #[test]
    fn filters_compose_with_and() {
        let list = Workspace::new().loaded();

        let v1 = list.select(&Selection::new().region("V1"));
        assert_eq!(keys(&v1), ["1", "2"]);

        let high_v1 = list.select(&Selection::new().region("V1").calcium(Calcium::High));
        assert_eq!(keys(&high_v1), ["1"]);

        let warm = list.select(&Selection::new().temperature("34"));
        assert_eq!(keys(&warm), ["1", "3"]);
    }

    #[test]
    fn empty_match_is_empty_repository() {
        let list = Workspace::new().loaded();
        let none = list.select(&Selection::new().region("V1").temperature("20"));
        assert!(none.is_empty());
        assert_eq!(none.connectivity_summary(None).len(), 0);
    }

    #[test]
    fn date_window_records_skips() {
        let list = Workspace::new().loaded();
        let start = NaiveDate::from_ymd_opt(2017, 4, 1).unwrap();
        let stop = NaiveDate::from_ymd_opt(2017, 6, 1).unwrap();

        let window = list.select(&Selection::new().start(start).stop(stop));

        assert_eq!(keys(&window), ["2"]);
        assert_eq!(window.start_skip().len(), 1);
        assert_eq!(window.stop_skip().len(), 1);
    }

    #[test]
    fn views_do_not_own_the_cache() {
        let ws = Workspace::new();
        let list = ws.loaded();
        let selected = list.select(&Selection::new().region("A1"));
        assert_eq!(keys(&selected), ["3"]);
        assert_eq!(selected.cache_path(), None);
        assert!(matches!(selected.write_cache(), Err(CacheError::NoDestination)));
    }
}

// =============================================================================
// Aggregation
// =============================================================================

mod aggregation {
    use super::*;

    #[test]
    fn sums_pairs_across_records() {
        let list = Workspace::new().loaded();
        let summary = list.connectivity_summary(None);

        let sst_pv = &summary[&TypePair::new("sst", "pvalb")];
        assert_eq!(sst_pv.connected, 3);
        assert_eq!(sst_pv.unconnected, 1);
        assert_eq!(sst_pv.connected_distances.len(), 3);
        assert_eq!(sst_pv.unconnected_distances.len(), 1);

        let pv_sst = &summary[&TypePair::new("pvalb", "sst")];
        assert_eq!(pv_sst.probed(), 1);

        assert_eq!(list.n_connections_probed(), (5, 3));
    }

    #[test]
    fn ranked_rows_use_distance_radii() {
        let list = Workspace::new().loaded();
        let rows = list.ranked_connectivity(Some(&TypePair::new("sst", "pvalb")));

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!((row.connected, row.probed), (3, 4));
        assert_eq!(row.percent, 75.0);
        assert_eq!(row.percent_250um, 100.0);
        assert_eq!(row.percent_100um, 100.0);
    }

    #[test]
    fn ranking_puts_unconnected_last() {
        let list = Workspace::new().loaded();
        let rows = list.ranked_connectivity(None);
        let pairs: Vec<String> = rows.iter().map(|r| r.pair.to_string()).collect();
        assert_eq!(pairs, ["sst->pvalb", "pvalb->sst"]);
    }
}
