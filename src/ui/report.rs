//! ui::report
//!
//! Plain-text renderings of repository summaries.
//!
//! Every renderer returns a `String` of newline-joined lines; printing is
//! left to the caller.

use crate::analysis::{ConnectivityRow, LabelSummary, SweepCriteria};
use crate::core::types::TypePair;
use crate::store::ExperimentList;

const RULE: &str = "----------------------------------------------------------";

fn banner(title: &str) -> Vec<String> {
    vec![RULE.to_string(), title.to_string(), RULE.to_string()]
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

/// Per-record table: probed, connected, age, cre types, id.
pub fn experiment_summary(list: &ExperimentList, list_stims: bool) -> String {
    let mut fields = vec!["# probed", "# connected", "age", "cre types"];
    if list_stims {
        fields.push("stim sets");
    }
    let mut lines = banner(&format!("  Experiment Summary  ({})", fields.join(", ")));

    if !list.start_skip().is_empty() {
        lines.push(format!(
            "[ skipped {} earlier experiments ]",
            list.start_skip().len()
        ));
    }
    for expt in list {
        let mut line = format!(
            "{:>4}: {:<5} {:<5} {:<7} {:<15} {}",
            opt(expt.summary_id),
            expt.n_connections_probed(),
            expt.n_connections(),
            opt(expt.age),
            expt.cre_types.join(", "),
            expt.id
        );
        if list_stims {
            line.push_str(&format!("\t{}", expt.list_stims().join(", ")));
        }
        lines.push(line);
    }
    if !list.stop_skip().is_empty() {
        lines.push(format!(
            "[ skipped {} later experiments ]",
            list.stop_skip().len()
        ));
    }

    lines.push(String::new());
    lines.push(match list.mean_age() {
        Some(age) => format!("Mean age: {age:.1}"),
        None => "Mean age: n/a".to_string(),
    });
    lines.join("\n")
}

fn connectivity_line(row: &ConnectivityRow, width: usize) -> String {
    let label = format!("{} → {}", row.pair.pre, row.pair.post);
    format!(
        "{label:<width$}\t:\t{}/{}\t{:.2}%\t{:.2}%\t{:.2}%\t{:.2}\t{:.2}\t{:.2}",
        row.connected,
        row.probed,
        row.percent,
        row.percent_250um,
        row.percent_100um,
        row.mean_connected_um,
        row.mean_unconnected_um,
        row.mean_distance_um,
    )
}

/// Ranked connectivity rows followed by the overall total.
pub fn connectivity_table(list: &ExperimentList, type_filter: Option<&TypePair>) -> String {
    let mut lines = banner(
        "     Connectivity  (# connected/probed, % connectivity, %250, %100, cdist, udist, adist)",
    );

    let rows = list.ranked_connectivity(type_filter);
    let width = rows
        .iter()
        .map(|r| r.pair.pre.chars().count() + r.pair.post.chars().count() + 3)
        .max()
        .unwrap_or(0)
        + 5;
    lines.extend(rows.iter().map(|row| connectivity_line(row, width)));

    let (probed, connected) = list.n_connections_probed();
    let percent = if probed == 0 {
        0.0
    } else {
        100.0 * connected as f64 / probed as f64
    };
    lines.push(String::new());
    lines.push(format!("Total:  \t{connected}/{probed}\t{percent:.2}%"));
    lines.join("\n")
}

/// One line per realized connection, with its stimulus histogram if
/// requested.
pub fn connection_list(
    list: &ExperimentList,
    type_filter: Option<&TypePair>,
    list_stims: bool,
) -> String {
    let mut lines = banner("       Connections");

    for conn in list.connection_summary(type_filter, list_stims) {
        let distance = conn
            .distance()
            .map_or_else(|| "?".to_string(), |d| format!("{:.0}", d * 1e6));
        lines.push(format!(
            "{} {}->{}: \t{} -> {}; {} um\t{}",
            conn.index,
            conn.pre.cell_id,
            conn.post.cell_id,
            conn.pre.cre_label(),
            conn.post.cre_label(),
            distance,
            conn.experiment.id
        ));
        let Some(stims) = &conn.stims else {
            continue;
        };
        if stims.is_empty() {
            lines.push(format!(
                "no sweeps: {} {}",
                conn.pre.cell_id, conn.post.cell_id
            ));
        }
        for (key, counts) in stims {
            lines.push(format!(
                "{} {} {}mV; {},{} sweeps",
                key.clamp_mode, key.stim_name, key.holding_mv, counts.standard, counts.short_pulse
            ));
        }
    }
    lines.join("\n")
}

/// Connections per stimulus set that meet the sweep thresholds.
pub fn sweep_threshold_report(list: &ExperimentList, criteria: &SweepCriteria) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "  Connection: connected/total probed".to_string(),
        format!(
            "            Stimulus Set: # connections w/ >= {} (induction) and {} (recovery) sweeps",
            criteria.thresholds.induction, criteria.thresholds.recovery
        ),
        RULE.to_string(),
    ];

    for group in list.sweep_threshold_report(criteria) {
        lines.push(String::new());
        lines.push(format!(
            "{}: {}/{}",
            group.pair, group.connected, group.probed
        ));
        for (key, n) in &group.stim_sets {
            lines.push(format!(
                "\t{} {} {}:\t{}",
                key.clamp_mode, key.stim_name, key.holding_mv, n
            ));
        }
    }
    lines.join("\n")
}

/// Biocytin fill rates.
pub fn label_summary(summary: &LabelSummary) -> String {
    let mut lines = banner("       Labeling");
    lines.push(format!(
        "{:.2} ({}/{}) of dye-filled cells had a biocytin fill",
        summary.dye_percent(),
        summary.dye_biocytin,
        summary.dye_filled
    ));
    lines.push(format!(
        "{:.2} ({}/{}) of qc-passed cells had a biocytin fill",
        summary.qc_percent(),
        summary.qc_biocytin,
        summary.qc_passed
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::experiment::{Cell, Experiment, SweepInfo, SweepSummary};
    use crate::core::types::ExperimentId;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn sample() -> ExperimentList {
        let id = ExperimentId::new("expts.txt", "1").unwrap();
        let sweep = SweepSummary::from([
            (
                0,
                SweepInfo {
                    stim_name: "PulseTrain_50Hz_DA_0".to_string(),
                    clamp_mode: "ic".to_string(),
                    holding: -0.055,
                },
            ),
            (
                1,
                SweepInfo {
                    stim_name: "TargetV".to_string(),
                    clamp_mode: "ic".to_string(),
                    holding: -0.055,
                },
            ),
        ]);
        let mut builder = Experiment::builder(id, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap())
            .summary_id(12)
            .age(45)
            .cre_type("sst")
            .cell(Cell::new(1).cre_type("sst").position([0.0, 0.0, 0.0]))
            .cell(Cell::new(2).cre_type("sst").position([0.0, 80e-6, 0.0]))
            .connected(1, 2)
            .probed(2, 1);
        for _ in 0..5 {
            builder = builder.sweep(sweep.clone());
        }
        ExperimentList::from_experiments([Arc::new(builder.build().unwrap())]).unwrap()
    }

    #[test]
    fn summary_rows() {
        let text = experiment_summary(&sample(), true);
        assert!(text.contains("  12: 2     1     45      sst"));
        assert!(text.contains("expts.txt:1\t50Hz, TargetV"));
        assert!(text.contains("Mean age: 45.0"));
        assert!(!text.contains("skipped"));
    }

    #[test]
    fn connectivity_total_uses_probed() {
        let text = connectivity_table(&sample(), None);
        assert!(text.contains("sst → sst"));
        assert!(text.contains("1/2\t50.00%"));
        assert!(text.ends_with("\n\nTotal:  \t1/2\t50.00%"));
    }

    #[test]
    fn connection_lines() {
        let text = connection_list(&sample(), None, true);
        assert!(text.contains("0 1->2: \tsst -> sst; 80 um\texpts.txt:1"));
        assert!(text.contains("ic 50Hz -55mV; 5,0 sweeps"));
    }

    #[test]
    fn sweep_report_lines() {
        let text = sweep_threshold_report(&sample(), &SweepCriteria::default());
        assert!(text.contains(">= 5 (induction) and 10 (recovery)"));
        assert!(text.contains("\nsst->sst: 1/2\n"));
        assert!(text.contains("\tic 50Hz -55:\t1"));
    }

    #[test]
    fn labels() {
        let text = label_summary(&LabelSummary {
            qc_passed: 4,
            qc_biocytin: 1,
            dye_filled: 0,
            dye_biocytin: 0,
        });
        assert!(text.contains("0.00 (0/0) of dye-filled"));
        assert!(text.contains("25.00 (1/4) of qc-passed"));
    }
}
