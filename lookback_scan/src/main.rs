mod timeline;

use clap::{Parser, ValueEnum};
use lookback_scan::{
    config::{DEFAULT_GROUP_WIDTH, DEFAULT_RESIDENT_GROUPS},
    reference, DispatchOrder, EmulatedScanner, InclusiveScan, ScanConfig, ScanSummary,
};
use std::{error::Error, process};
use timeline::Timeline;

/// Element count used when `--mebi-items` is not given.
const DEFAULT_NUM_ITEMS: usize = 1024 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Host threads standing in for device lanes.
    Emulated,
    /// The first CUDA device.
    #[cfg(feature = "cuda")]
    Cuda,
}

#[derive(Debug, Parser)]
#[command(name = "lookback_scan", version)]
#[command(about = "Single-pass inclusive scan of a sequence of ones, checked against a sequential host scan")]
struct Args {
    /// Number of elements, in units of 1024 * 1024 [default: 16 * 1024 elements]
    #[arg(long)]
    mebi_items: Option<usize>,

    #[arg(long, value_enum, default_value_t = Backend::Emulated)]
    backend: Backend,

    /// Lanes per group [default: 64 emulated, the compiled width on CUDA]
    #[arg(long)]
    group_width: Option<usize>,

    /// Groups the emulated device runs at once
    #[arg(long, default_value_t = DEFAULT_RESIDENT_GROUPS)]
    resident_groups: usize,

    /// Hand physical groups to the emulated device in an order shuffled with this seed
    #[arg(long)]
    shuffle_seed: Option<u64>,
}

impl Args {
    fn num_items(&self) -> Result<usize, String> {
        match self.mebi_items {
            None => Ok(DEFAULT_NUM_ITEMS),
            Some(mebi) => mebi
                .checked_mul(1024 * 1024)
                .ok_or_else(|| format!("--mebi-items {mebi} overflows the element count")),
        }
    }

    fn config(&self) -> ScanConfig {
        let default_width = match self.backend {
            Backend::Emulated => DEFAULT_GROUP_WIDTH,
            #[cfg(feature = "cuda")]
            Backend::Cuda => lookback_scan_gpu::kernels::GROUP_WIDTH,
        };
        let dispatch = self
            .shuffle_seed
            .map_or(DispatchOrder::InOrder, |seed| DispatchOrder::Shuffled { seed });
        ScanConfig::default()
            .with_group_width(self.group_width.unwrap_or(default_width))
            .with_resident_groups(self.resident_groups)
            .with_dispatch(dispatch)
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let num_items = args.num_items()?;
    let config = args.config();

    let mut data = vec![1u32; num_items];
    let mut timeline = Timeline::new();

    let summary = match args.backend {
        Backend::Emulated => {
            let scanner = EmulatedScanner::new(&config)?;
            println!(
                "Running on device: host emulator ({} resident groups of {} lanes)",
                config.resident_groups, config.group_width
            );
            timeline.stamp("device");
            scanner.inclusive_scan(&mut data)?
        }
        #[cfg(feature = "cuda")]
        Backend::Cuda => {
            let scanner = lookback_scan::CudaScanner::with_config(&config)?;
            println!("Running on device: {}", scanner.device_name()?);
            timeline.stamp("device");
            scanner.inclusive_scan(&mut data)?
        }
    };

    timeline.stamp("host");
    let mut expected = vec![1u32; num_items];
    reference::inclusive_scan_in_place(&mut expected);
    timeline.finish();

    println!("num_items: {}", num_items);
    timeline.print();
    report(&data, &summary);

    if let Some(i) = reference::first_mismatch(&expected, &data) {
        return Err(format!(
            "device result differs from host scan at index {}: expected {}, got {}",
            i, expected[i], data[i]
        )
        .into());
    }
    println!("device result matches host scan");
    Ok(())
}

fn report(data: &[u32], summary: &ScanSummary<u32>) {
    let head = data.iter().take(10);
    let tail = data.iter().skip(data.len().saturating_sub(10));
    let head = head.map(u32::to_string).collect::<Vec<_>>().join(",");
    let tail = tail.map(u32::to_string).collect::<Vec<_>>().join(",");
    println!("{head},...,{tail}");

    println!(
        "kernel execution time without transfers: {:.3} ms ({} groups)",
        summary.kernel_time.as_secs_f64() * 1e3,
        summary.shape.num_groups
    );
    println!(
        "kernel throughput without transfers: {:.3} GB/s",
        summary.throughput_gib_per_sec()
    );
}
