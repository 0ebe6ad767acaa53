// Output formatting and display for CLI

use crate::config::{bytes2human, CommandReloaderConfig, MemLimit, ResourceWatcherConfig};
use crate::stats::MetricRecord;
use colored::*;
use std::collections::BTreeMap;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

fn print_table(table: &mut Table) {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("\n{}\n", table);
}

/// Print the validated resource watchers of a config file
pub fn print_watcher_table(watchers: &[ResourceWatcherConfig]) {
    #[derive(Tabled)]
    struct WatcherRow {
        #[tabled(rename = "Watcher")]
        watcher: String,
        #[tabled(rename = "Mode")]
        mode: String,
        #[tabled(rename = "CPU")]
        cpu: String,
        #[tabled(rename = "Memory")]
        memory: String,
        #[tabled(rename = "Health")]
        health: String,
        #[tabled(rename = "Max count")]
        max_count: String,
        #[tabled(rename = "Action")]
        action: String,
        #[tabled(rename = "Loop / debounce")]
        timing: String,
    }

    if watchers.is_empty() {
        println!("{}", "No resource watchers configured".yellow());
        return;
    }

    let rows: Vec<WatcherRow> = watchers
        .iter()
        .map(|w| {
            let t = &w.thresholds;
            WatcherRow {
                watcher: w.watcher.cyan().to_string(),
                mode: if t.per_process { "process" } else { "group" }.to_string(),
                cpu: format_range(
                    t.min_cpu.map(format_percent),
                    t.max_cpu.map(format_percent),
                ),
                memory: format_range(
                    t.min_mem.map(format_mem_limit),
                    t.max_mem.map(format_mem_limit),
                ),
                health: t
                    .health_threshold
                    .map(|h| format!("> {}", format_percent(h)))
                    .unwrap_or_else(|| "-".to_string()),
                max_count: t.max_count.to_string(),
                action: t.action.to_string().bold().to_string(),
                timing: format!(
                    "{} / {}",
                    format_duration(&w.loop_rate),
                    format_duration(&w.debounce)
                ),
            }
        })
        .collect();

    print_table(&mut Table::new(rows));
}

/// Print the validated command reloaders of a config file
pub fn print_reloader_table(reloaders: &[CommandReloaderConfig]) {
    #[derive(Tabled)]
    struct ReloaderRow {
        #[tabled(rename = "Watchers")]
        watchers: String,
        #[tabled(rename = "Watching")]
        watching: String,
        #[tabled(rename = "Action")]
        action: String,
        #[tabled(rename = "Loop")]
        loop_rate: String,
    }

    if reloaders.is_empty() {
        return;
    }

    let rows: Vec<ReloaderRow> = reloaders
        .iter()
        .map(|r| ReloaderRow {
            watchers: r
                .watchers
                .as_ref()
                .map(|names| names.join(", "))
                .unwrap_or_else(|| "*".to_string()),
            watching: if r.use_working_dir { "working_dir" } else { "cmd" }.to_string(),
            action: if r.use_reload { "reload" } else { "restart" }.to_string(),
            loop_rate: format_duration(&r.loop_rate),
        })
        .collect();

    print_table(&mut Table::new(rows));
}

/// Print one sample per PID
pub fn print_sample_table(samples: &BTreeMap<u32, MetricRecord>) {
    #[derive(Tabled)]
    struct SampleRow {
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "CPU")]
        cpu: String,
        #[tabled(rename = "Memory %")]
        mem_percent: String,
        #[tabled(rename = "Memory")]
        mem_bytes: String,
    }

    let rows: Vec<SampleRow> = samples
        .iter()
        .map(|(pid, record)| SampleRow {
            pid: pid.to_string(),
            cpu: format_reading(record.cpu_percent.map(format_percent)),
            mem_percent: format_reading(record.mem_percent.map(format_percent)),
            mem_bytes: format_reading(record.mem_bytes.map(bytes2human)),
        })
        .collect();

    print_table(&mut Table::new(rows));
    println!(
        "{}",
        format!("Total: {} process(es)", samples.len())
            .dimmed()
            .italic()
    );
}

fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

fn format_mem_limit(limit: MemLimit) -> String {
    match limit {
        MemLimit::Percent(p) => format_percent(p),
        MemLimit::Bytes(b) => bytes2human(b),
    }
}

/// Render `min`/`max` thresholds as `< min, > max`
fn format_range(min: Option<String>, max: Option<String>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("< {}, > {}", min, max),
        (Some(min), None) => format!("< {}", min),
        (None, Some(max)) => format!("> {}", max),
        (None, None) => "-".to_string(),
    }
}

/// Unavailable readings are shown as N/A
fn format_reading(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".dimmed().to_string())
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(&Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(&Duration::from_secs(3600)), "1h");
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range(None, None), "-");
        assert_eq!(format_range(None, Some("90.0%".to_string())), "> 90.0%");
        assert_eq!(
            format_range(Some("5.0%".to_string()), Some("500M".to_string())),
            "< 5.0%, > 500M"
        );
    }

    #[test]
    fn test_format_mem_limit() {
        assert_eq!(format_mem_limit(MemLimit::Percent(90.0)), "90.0%");
        assert_eq!(format_mem_limit(MemLimit::Bytes(500 * 1024 * 1024)), "500M");
    }
}
