#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

use psbench::{endpoint_qps_cmd, stream_throughput_cmd, task_pipelining_cmd, task_rtt_cmd};

#[derive(Parser, Debug)]
#[command(name = "psbench")]
#[command(about = "Benchmarks for task executors, object stores and streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Task chains submitted sequentially or pipelined through store futures
    #[command(disable_help_flag = true)]
    TaskPipelining {
        /// Benchmark options (see `psbench task-pipelining --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Round-trip time of a single task
    #[command(disable_help_flag = true)]
    TaskRtt {
        /// Benchmark options (see `psbench task-rtt --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Queries per second against a store endpoint
    #[command(disable_help_flag = true)]
    EndpointQps {
        /// Benchmark options (see `psbench endpoint-qps --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Item throughput and latency through a stream
    #[command(disable_help_flag = true)]
    StreamThroughput {
        /// Benchmark options (see `psbench stream-throughput --help`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::TaskPipelining { args } => task_pipelining_cmd::main(args),
        Commands::TaskRtt { args } => task_rtt_cmd::main(args),
        Commands::EndpointQps { args } => endpoint_qps_cmd::main(args),
        Commands::StreamThroughput { args } => stream_throughput_cmd::main(args),
    };
    std::process::exit(code);
}
