use crate::commands::run_pass;
use crate::config::Config;
use crate::output::FormatSink;

pub fn handle_collect_command(format: &str, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink = FormatSink::new(format);
    run_pass(config, &mut sink)
}
