use std::{thread, time::Duration};

use anyhow::{anyhow, Result};
use tracing::info;
use vectiles::{convert_to_mbtiles, ConvertRequest, JobRunner, JobStatus, ServerConfig};

use crate::cli::{BuildArgs, Cli};
use super::{load_config, serve::serve_until_ctrl_c};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(_cli: &Cli, args: &BuildArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let request = ConvertRequest {
        inputs: args.inputs.clone(),
        output: args.output.clone().unwrap_or(config.mbtiles.output),
        min_zoom: args.min_zoom.unwrap_or(config.mbtiles.min_zoom),
        max_zoom: args.max_zoom.unwrap_or(config.mbtiles.max_zoom),
    };
    let output = request.output.clone();

    let runner = JobRunner::new();
    let handle = runner.create_job("convert", move |progress| convert_to_mbtiles(&request, progress));

    let mut last_message = String::new();
    loop {
        let job = handle.snapshot();
        if job.message != last_message {
            info!("[{:>3.0}%] {}", job.progress * 100.0, job.message);
            last_message = job.message;
        }
        if job.status.is_terminal() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    let job = handle.wait();
    if job.status != JobStatus::Completed {
        return Err(anyhow!(job.error.unwrap_or_else(|| "conversion failed".into())));
    }
    if let Some(result) = &job.result {
        info!(tiles_written = %result["tiles_written"], "built {}", output.display());
    }

    if args.serve {
        let mut server: ServerConfig = config.tileserver.into();
        server.mbtiles = output;
        serve_until_ctrl_c(server)?;
    }
    Ok(())
}
