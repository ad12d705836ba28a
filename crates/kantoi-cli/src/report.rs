//! Markdown rendering for window reports and briefs.

use chrono::Utc;
use kantoi_core::{Brief, WindowPreset};
use kantoi_db::PgStore;
use kantoi_sentiment::{Delta, MetricsReport};

/// Print a markdown report for `preset` ending now, with the latest brief.
///
/// # Errors
///
/// Returns an error if the store fails.
pub(crate) async fn run_report(store: &PgStore, preset: WindowPreset) -> anyhow::Result<()> {
    let report = kantoi_sentiment::get_metrics_report(store, preset, Utc::now()).await?;
    let brief = kantoi_sentiment::get_latest_brief(store).await?;
    println!("{}", render_report(&report, brief.as_ref()));
    Ok(())
}

fn fmt_delta(delta: Delta, unit: &str) -> String {
    match delta {
        Delta::Stable => "stable".to_string(),
        Delta::Change(v) => format!("{v:+.2}{unit}"),
        Delta::NoBaseline => "n/a".to_string(),
    }
}

pub(crate) fn render_report(report: &MetricsReport, brief: Option<&Brief>) -> String {
    let m = &report.current;
    let mut lines = vec![
        "# Trust Report".to_string(),
        String::new(),
        format!(
            "**Window**: {} ({} to {})",
            report.preset,
            m.window.start.format("%Y-%m-%d %H:%M UTC"),
            m.window.end.format("%Y-%m-%d %H:%M UTC")
        ),
        format!(
            "**Signals**: {} (previous window: {})",
            m.count, report.previous_count
        ),
        format!(
            "**Dominant topic**: {}",
            m.dominant_topic.map_or("none", |t| t.as_str())
        ),
        String::new(),
        "| Metric | Value | Change |".to_string(),
        "|--------|-------|--------|".to_string(),
        format!(
            "| Mean impact | {:.2} | {} |",
            m.mean_impact,
            fmt_delta(report.deltas.mean_impact, "")
        ),
        format!(
            "| Consensus | {:.1}% | {} |",
            m.consensus_pct,
            fmt_delta(report.deltas.consensus, " pts")
        ),
        format!(
            "| Resistance | {:.1}% | {} |",
            m.resistance_pct,
            fmt_delta(report.deltas.resistance, " pts")
        ),
    ];

    if m.count == 0 {
        lines.push(String::new());
        lines.push("No signals in this window.".to_string());
    } else {
        lines.push(String::new());
        lines.push("## Burning issues".to_string());
        lines.push(String::new());
        push_triggers(&mut lines, &m.burning_issues);

        lines.push(String::new());
        lines.push("## Wins".to_string());
        lines.push(String::new());
        push_triggers(&mut lines, &m.wins);

        lines.push(String::new());
        lines.push("## Topics".to_string());
        lines.push(String::new());
        lines.push("| Topic | Volume | Mean impact | Top trigger |".to_string());
        lines.push("|-------|--------|-------------|-------------|".to_string());
        for t in &m.topics {
            lines.push(format!(
                "| {} | {} | {:.2} | {} |",
                t.topic, t.volume, t.mean_impact, t.top_trigger
            ));
        }

        lines.push(String::new());
        lines.push("## Share of voice".to_string());
        lines.push(String::new());
        for share in &m.share_of_voice {
            lines.push(format!(
                "- {}: {} ({:.1}%)",
                share.archetype, share.count, share.pct
            ));
        }
    }

    if let Some(brief) = brief {
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(render_brief(brief));
    }

    lines.join("\n")
}

fn push_triggers(lines: &mut Vec<String>, triggers: &[kantoi_sentiment::aggregate::TriggerImpact]) {
    if triggers.is_empty() {
        lines.push("_none_".to_string());
        return;
    }
    for (rank, t) in triggers.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({:+.2} over {} signal(s))",
            rank + 1,
            t.trigger,
            t.total_impact,
            t.count
        ));
    }
}

pub(crate) fn render_brief(brief: &Brief) -> String {
    let delta = |d: Option<f64>| d.map_or_else(|| "n/a".to_string(), |v| format!("{v:+.2}"));
    let mut lines = vec![
        format!("## {}", brief.headline),
        String::new(),
        format!(
            "**Generated**: {}",
            brief.generated_at.format("%Y-%m-%d %H:%M UTC")
        ),
        format!(
            "**Score**: {:.2} (vs yesterday {}, vs last week {})",
            brief.window_score,
            delta(brief.day_delta),
            delta(brief.week_delta)
        ),
    ];
    if !brief.key_driver.is_empty() {
        lines.push(format!("**Key driver**: {}", brief.key_driver));
    }
    lines.push(String::new());
    lines.push(brief.narrative.clone());
    if !brief.private_memo.is_empty() {
        lines.push(String::new());
        lines.push(format!("> {}", brief.private_memo));
    }

    for (title, evidence) in [
        ("Threats", &brief.top_negative),
        ("Wins", &brief.top_positive),
    ] {
        if evidence.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("### {title}"));
        for s in evidence {
            lines.push(format!(
                "- [{:+.2}] {} / {}: {}",
                s.impact_score, s.archetype, s.specific_trigger, s.summary
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use kantoi_core::{Archetype, Sentiment, Signal, Topic, Window};
    use kantoi_sentiment::aggregate::{compare, window_metrics};

    use super::*;

    fn signal(id: &str, hours: i64, impact: f64, trigger: &str) -> Signal {
        Signal {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap() + Duration::hours(hours),
            sentiment: Sentiment::from_continuous(impact),
            archetype: Archetype::HeartlandConservative,
            topic: Topic::CostOfLiving,
            specific_trigger: trigger.to_string(),
            is_identity_risk: false,
            is_sarcasm: false,
            summary: format!("summary {id}"),
            velocity: None,
            impact_score: impact,
            weights_version: 1,
        }
    }

    fn report(current: &[Signal], previous: &[Signal]) -> MetricsReport {
        let end = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let window = WindowPreset::Day.window_ending(end);
        let cur = window_metrics(&window, current);
        let prev = window_metrics(&window.previous(), previous);
        MetricsReport {
            preset: WindowPreset::Day,
            deltas: compare(&cur, &prev),
            previous_count: prev.count,
            current: cur,
        }
    }

    #[test]
    fn report_lists_issues_and_deltas() {
        let current = [
            signal("a", 1, -2.5, "diesel subsidy"),
            signal("b", 2, -2.5, "diesel subsidy"),
            signal("c", 3, 1.5, "cash aid"),
        ];
        let md = render_report(&report(&current, &[]), None);

        assert!(md.starts_with("# Trust Report"));
        assert!(md.contains("**Signals**: 3 (previous window: 0)"));
        assert!(md.contains("**Dominant topic**: Cost of Living"));
        assert!(md.contains("1. diesel subsidy (-5.00 over 2 signal(s))"));
        assert!(md.contains("1. cash aid (+1.50 over 1 signal(s))"));
        assert!(md.contains("| Mean impact | -1.17 | n/a |"));
    }

    #[test]
    fn empty_window_says_so() {
        let md = render_report(&report(&[], &[]), None);
        assert!(md.contains("No signals in this window."));
        assert!(md.contains("**Dominant topic**: none"));
        assert!(!md.contains("## Burning issues"));
    }

    #[test]
    fn brief_renders_deltas_and_evidence() {
        let brief = Brief {
            generated_at: Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap(),
            window_score: -0.5,
            headline: "Diesel Anxiety Real".to_string(),
            narrative: "The rhetoric says recovery.".to_string(),
            private_memo: String::new(),
            key_driver: "diesel".to_string(),
            day_delta: Some(0.5),
            week_delta: None,
            top_positive: vec![],
            top_negative: vec![signal("a", 1, -2.5, "diesel subsidy")],
        };
        let md = render_brief(&brief);

        assert!(md.starts_with("## Diesel Anxiety Real"));
        assert!(md.contains("(vs yesterday +0.50, vs last week n/a)"));
        assert!(md.contains("### Threats"));
        assert!(!md.contains("### Wins"));
        assert!(md.contains("- [-2.50] Heartland Conservative / diesel subsidy: summary a"));
    }

    #[test]
    fn window_bounds_are_printed() {
        let md = render_report(&report(&[], &[]), None);
        let window = Window::new(
            Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
        );
        assert!(md.contains(&format!(
            "**Window**: 24h ({} to {})",
            window.start.format("%Y-%m-%d %H:%M UTC"),
            window.end.format("%Y-%m-%d %H:%M UTC")
        )));
    }
}
