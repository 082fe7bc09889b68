use anyhow::Result;
use diagnostics::*;
use medalstore::{Pipeline, PipelineConfig, RunSummary};

fn format_summary(config: &PipelineConfig, summary: &RunSummary) -> String {
    let output_dir = config.output_dir.display();
    format!(
        "countries:    {} rows\nolympics:     {} rows\ndenormalized: {} rows\nwritten to {output_dir}\n",
        summary.countries, summary.olympics, summary.denormalized
    )
}

/// Run the pipeline once and report the resulting row counts.
#[allow(clippy::print_stdout)]
pub fn run_command(config: PipelineConfig, output: Option<&mut String>) -> Result<RunSummary> {
    let data_dir = config.data_dir.display().to_string();
    debug!("run_command with data_dir {data_dir}", data_dir: data_dir);

    let pipeline = Pipeline::new(config);
    let summary = pipeline.run()?.summary();
    let formatted = format_summary(pipeline.config(), &summary);

    if let Some(output_buffer) = output {
        output_buffer.push_str(&formatted);
    } else {
        print!("{formatted}");
    }
    Ok(summary)
}
