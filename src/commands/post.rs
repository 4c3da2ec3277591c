use reqwest::blocking::Client;
use std::error::Error;
use tracing::info;

use crate::commands::run_pass;
use crate::config::Config;
use crate::metrics::RecordBatch;
use crate::output::{print_success, RecordSink};

/// Posts the batch as JSON to a metrics API.
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(api_url: &str) -> Self {
        HttpSink {
            client: Client::new(),
            endpoint: format!("{}/api/v1/vsphere/metrics", api_url.trim_end_matches('/')),
        }
    }
}

impl RecordSink for HttpSink {
    fn emit(&mut self, batch: &RecordBatch) -> Result<(), Box<dyn Error>> {
        info!(url = %self.endpoint, records = batch.record_count(), "posting metrics");

        let response = self.client.post(&self.endpoint).json(batch).send()?;

        if response.status().is_success() {
            print_success(&format!(
                "Posted {} records from {} to {}",
                batch.record_count(),
                batch.datacenter,
                self.endpoint
            ));
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text()?;
            Err(format!("Failed to post metrics: HTTP {}: {}", status, error_text.trim()).into())
        }
    }
}

pub fn handle_post_command(api_url: &str, config: &Config) -> Result<(), Box<dyn Error>> {
    let mut sink = HttpSink::new(api_url);
    run_pass(config, &mut sink)
}
