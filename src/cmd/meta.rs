/*!
`meta.rs`

Implements the `meta` subcommand: one metadata request against Log Cache,
rendered as an aligned table.

Pipeline:
  fetch (MetaSource, bounded by --timeout)
    -> build_rows (split source ids, sort, compute cache durations)
    -> render (TabWriter table) | render_json (--json)

Behavior:
  - No data (empty mapping or an empty response) prints nothing, exits 0.
  - Any other fetch failure is returned as-is.
  - Rows are built in full before anything is written.

Source ids are `namespace/type/name`; anything that does not split into
exactly three parts is shown as the name with `-` for type and namespace.
*/

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeDelta};
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use tracing::{debug, trace};

use crate::cmd::format::{TabOpts, TabWriter, format_duration};
use crate::config::MetaConfig;
use crate::logcache::{HttpClient, MetaError, MetaInfo, MetaSource};

const HEADERS: [&str; 6] = [
    "RESOURCE",
    "TYPE",
    "NAMESPACE",
    "COUNT",
    "EXPIRED",
    "CACHE DURATION",
];

const TABLE_OPTS: TabOpts = TabOpts {
    min_width: 0,
    tab_width: 3,
    padding: 3,
    pad_char: ' ',
};

/// CLI arguments for `log-cache-meta meta`
#[derive(Args, Debug)]
pub struct MetaArgs {
    /// Deadline for the metadata request, e.g. 2s or 500ms [default: 2s]
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<humantime::Duration>,

    /// Omit the header line
    #[arg(long)]
    pub no_headers: bool,

    /// Output JSON instead of the aligned table
    #[arg(long)]
    pub json: bool,
}

/// One display row per source id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub resource_name: String,
    pub resource_type: String,
    pub namespace: String,
    pub count: i64,
    pub expired: i64,
    /// newest - oldest, truncated to whole seconds
    pub duration: TimeDelta,
}

impl Row {
    /// Duration as shown to the user: never below one second.
    pub fn display_duration(&self) -> TimeDelta {
        self.duration.max(TimeDelta::seconds(1))
    }
}

/// Entry point for the meta subcommand.
pub fn execute_meta(config: MetaConfig) -> Result<()> {
    let client = HttpClient::new(config.addr.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_meta(&client, &config, &mut out)
}

/// Fetch, transform and render against any source / writer.
pub fn run_meta<S, W>(source: &S, config: &MetaConfig, out: &mut W) -> Result<()>
where
    S: MetaSource + ?Sized,
    W: Write,
{
    let meta = match source.fetch_meta(config.timeout) {
        Ok(meta) => meta,
        Err(MetaError::EndOfStream) => {
            debug!("metadata response ended without content");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if meta.is_empty() {
        debug!("no sources reported");
        return Ok(());
    }

    let rows = build_rows(&meta);
    trace!(rows = rows.len(), "built meta rows");

    if config.json {
        render_json(&rows, out)
    } else {
        render(&rows, !config.no_headers, out)
    }
}

/// Split a source id into (resource name, resource type, namespace).
pub fn source_parts(source_id: &str) -> (&str, &str, &str) {
    let parts: Vec<&str> = source_id.split('/').collect();
    match parts.as_slice() {
        [namespace, resource_type, name] => (*name, *resource_type, *namespace),
        _ => (source_id, "-", "-"),
    }
}

/// Time between the oldest and newest retained envelope, truncated to seconds.
pub fn cache_duration(info: &MetaInfo) -> TimeDelta {
    let newest = DateTime::from_timestamp_nanos(info.newest_timestamp);
    let oldest = DateTime::from_timestamp_nanos(info.oldest_timestamp);
    TimeDelta::seconds((newest - oldest).num_seconds())
}

/// One row per entry, ordered by namespace, then name, then type.
pub fn build_rows(meta: &HashMap<String, MetaInfo>) -> Vec<Row> {
    // Visit ids in order so rows with equal sort keys keep a fixed order.
    let mut ids: Vec<&String> = meta.keys().collect();
    ids.sort();

    let mut rows: Vec<Row> = ids
        .into_iter()
        .map(|id| {
            let info = &meta[id];
            let (name, resource_type, namespace) = source_parts(id);
            Row {
                resource_name: name.to_string(),
                resource_type: resource_type.to_string(),
                namespace: namespace.to_string(),
                count: info.count,
                expired: info.expired,
                duration: cache_duration(info),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (&a.namespace, &a.resource_name, &a.resource_type).cmp(&(
            &b.namespace,
            &b.resource_name,
            &b.resource_type,
        ))
    });
    rows
}

/// Write the aligned table. Output is only produced on the final flush.
pub fn render<W: Write>(rows: &[Row], include_header: bool, out: &mut W) -> Result<()> {
    let mut tw = TabWriter::new(out, TABLE_OPTS);
    write_table(&mut tw, rows, include_header)
        .and_then(|()| tw.flush())
        .map_err(|_| anyhow!("error writing results"))
}

fn write_table<W: Write>(tw: &mut W, rows: &[Row], include_header: bool) -> io::Result<()> {
    if include_header {
        writeln!(tw, "{}", HEADERS.join("\t"))?;
    }
    for r in rows {
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}\t{}",
            r.resource_name,
            r.resource_type,
            r.namespace,
            r.count,
            r.expired,
            format_duration(r.display_duration()),
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    resource: &'a str,
    #[serde(rename = "type")]
    resource_type: &'a str,
    namespace: &'a str,
    count: i64,
    expired: i64,
    cache_duration_secs: i64,
}

/// Write rows as a pretty JSON array.
pub fn render_json<W: Write>(rows: &[Row], out: &mut W) -> Result<()> {
    let items: Vec<JsonRow<'_>> = rows
        .iter()
        .map(|r| JsonRow {
            resource: &r.resource_name,
            resource_type: &r.resource_type,
            namespace: &r.namespace,
            count: r.count,
            expired: r.expired,
            cache_duration_secs: r.display_duration().num_seconds(),
        })
        .collect();

    serde_json::to_writer_pretty(&mut *out, &items)
        .map_err(io::Error::from)
        .and_then(|()| writeln!(out))
        .and_then(|()| out.flush())
        .map_err(|_| anyhow!("error writing results"))
}
