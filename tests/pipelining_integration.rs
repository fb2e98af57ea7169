use std::sync::Arc;

use psbench::bench::{Benchmark, Resources};
use psbench::benchmarks::task_pipelining::{
    DEFAULT_POLLING_INTERVAL, RunConfig, SubmissionMethod, TaskPipelining,
};
use psbench::executor::ThreadPool;
use psbench::store::{FileConnector, Store};
use tempfile::tempdir;

fn config(method: SubmissionMethod) -> RunConfig {
    RunConfig {
        submission_method: method,
        task_chain_length: 5,
        task_data_bytes: 100,
        task_overhead_fraction: 0.1,
        task_sleep: 0.01,
        polling_interval: DEFAULT_POLLING_INTERVAL,
        future_timeout: 10.0,
    }
}

#[test]
fn pipelined_workflow_through_file_store() {
    let dir = tempdir().unwrap();
    let store = Store::new("pipeline", FileConnector::new(dir.path().join("store")));
    let resources = Resources::new()
        .with_executor(Arc::new(ThreadPool::new("thread", 4).unwrap()))
        .with_store(Some(store));
    let mut bench = TaskPipelining::new(resources);
    bench.enter().unwrap();

    for method in [
        SubmissionMethod::SequentialNoProxy,
        SubmissionMethod::SequentialProxy,
        SubmissionMethod::PipelinedProxyFuture,
    ] {
        let result = bench.run(&config(method)).unwrap().into_records().remove(0);
        assert_eq!(result.submission_method, method.to_string());
        assert_eq!(result.connector, "file");
        assert_eq!(result.task_chain_length, 5);
        // Each task computes for at least 9 ms, and the last one cannot
        // start before the first one's compute time has passed.
        assert!(result.workflow_makespan_ms >= 45.0, "{method}: {}", result.workflow_makespan_ms);

        let timings = result.timings().unwrap();
        assert_eq!(timings.len(), 5);
        for pair in timings.windows(2) {
            // A task never finishes reading its input before its
            // predecessor finished producing it.
            assert!(pair[1].resolve_end_timestamp >= pair[0].generate_end_timestamp);
        }
    }

    bench.exit().unwrap();
}
