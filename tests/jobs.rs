mod common;

use vectiles::{convert_to_mbtiles, ConvertRequest, JobRunner, JobStatus};

#[test]
fn conversion_runs_as_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = common::write_paris_layers(dir.path()).into_iter().map(|(_, path)| path).collect();
    let request = ConvertRequest { inputs, output: dir.path().join("out.mbtiles"), min_zoom: 10, max_zoom: 12 };

    let runner = JobRunner::new();
    let handle = runner.create_job("convert", move |progress| convert_to_mbtiles(&request, progress));
    let id = handle.id();
    let job = handle.wait();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 1.0);
    assert_eq!(job.message, "Done");
    let result = job.result.as_ref().unwrap();
    assert!(result["tiles_written"].as_u64().unwrap() > 0);
    assert_eq!(result["bounds"].as_array().map(Vec::len), Some(4));
    assert_eq!(runner.get_job(id), Some(job));
}

#[test]
fn failed_conversion_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let empty = common::write_geojson(dir.path(), "empty", &common::empty_collection());
    let request = ConvertRequest { inputs: vec![empty], output: dir.path().join("out.mbtiles"), min_zoom: 5, max_zoom: 6 };

    let job = JobRunner::new()
        .create_job("convert", move |progress| convert_to_mbtiles(&request, progress))
        .wait();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.message, "Failed");
    assert!(job.error.unwrap().contains("no GeoJSON layers contained features"));
    assert!(job.result.is_none());
}

#[test]
fn cloned_runners_share_the_registry() {
    let runner = JobRunner::new();
    let clone = runner.clone();
    let job = runner.create_job("noop", |_progress| Ok(())).wait();
    assert_eq!(clone.get_job(job.id).map(|job| job.status), Some(JobStatus::Completed));
}
