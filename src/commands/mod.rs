pub mod collect;
pub mod post;

pub use collect::handle_collect_command;
pub use post::handle_post_command;

use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::inventory::vim::VimClient;
use crate::inventory::{Deadline, InventoryClient};
use crate::metrics::Collector;
use crate::output::{print_warning, RecordSink};

/// Connect, run one collection pass and hand the batch to `sink`.
pub fn run_pass(config: &Config, sink: &mut dyn RecordSink) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = Deadline::start(config.connection.timeout);
    let client = VimClient::connect(&config.connection, deadline)?;
    let result = collect_with(&client, config, deadline, sink);
    client.logout();
    result
}

/// Collect through an open session and emit the batch.
///
/// Kinds that failed are reported after the sink has received the kinds that
/// succeeded; any failure makes the whole command fail with one error naming
/// every failed kind.
pub fn collect_with<C: InventoryClient + ?Sized>(
    client: &C,
    config: &Config,
    deadline: Deadline,
    sink: &mut dyn RecordSink,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = Collector::new(
        client,
        config.datacenter.as_deref(),
        &config.pattern,
        deadline,
    );
    let collection = collector.run()?;
    let total_kinds = collection.outcomes.len();
    info!(datacenter = %collection.scope.name, state = ?collector.state(), "pass finished");

    let (batch, failures) = collection.into_batch(Utc::now());
    if batch.record_count() == 0 && failures.is_empty() {
        print_warning(&format!(
            "no datastores or virtual machines matched '{}' in {}",
            config.pattern.as_str(),
            batch.datacenter
        ));
    }
    sink.emit(&batch)?;

    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        if let Some(kind) = failure.kind() {
            info!(%kind, "records of failed kind discarded");
        }
    }
    let reasons: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
    Err(format!(
        "collection incomplete ({} of {} entity kinds failed): {}",
        failures.len(),
        total_kinds,
        reasons.join("; ")
    )
    .into())
}
