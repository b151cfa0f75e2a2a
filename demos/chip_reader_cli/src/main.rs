//! Demo harness: drives `chip_reader::ChipReader` against the in-memory
//! synthetic raster backend so the producer/consumer loop can be exercised
//! without a real georeferenced dataset on hand.

use clap::{Parser, ValueEnum};

use chip_reader::config::Mode as ReaderMode;
use chip_reader::raster::synthetic::{NoDataPolicy, SyntheticRasterOpener};
use chip_reader::{ChipReader, ChipReaderConfig, PixelType};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliMode {
    Training,
    Evaluation,
    Inference,
}

impl From<CliMode> for ReaderMode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::Training => ReaderMode::Training,
            CliMode::Evaluation => ReaderMode::Evaluation,
            CliMode::Inference => ReaderMode::Inference,
        }
    }
}

/// Pull a run of chips out of chip-reader's synthetic backend and report
/// basic throughput stats.
#[derive(Parser, Debug)]
#[command(name = "chip-reader-cli")]
struct Args {
    #[arg(long, value_enum, default_value = "training")]
    mode: CliMode,

    #[arg(long, default_value_t = 4096)]
    raster_width: usize,

    #[arg(long, default_value_t = 4096)]
    raster_height: usize,

    #[arg(long, default_value_t = 256)]
    window_size: usize,

    #[arg(long, default_value_t = 4)]
    n_workers: usize,

    #[arg(long, default_value_t = 8)]
    n_slots: usize,

    #[arg(long, default_value_t = 3)]
    band_count: usize,

    /// How many chips to pull before stopping (ignored in inference mode,
    /// which instead does a single synchronous read at --x/--y).
    #[arg(long, default_value_t = 200)]
    pull_count: usize,

    #[arg(long, default_value_t = 0)]
    x: usize,

    #[arg(long, default_value_t = 0)]
    y: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    chip_reader::init();

    let args = Args::parse();
    let bands: Vec<u32> = (1..=args.band_count as u32).collect();

    let opener = SyntheticRasterOpener::new(
        args.raster_width,
        args.raster_height,
        args.band_count,
        NoDataPolicy::AllFull,
    );
    let mut reader = ChipReader::new(opener);
    let config = ChipReaderConfig {
        n_workers: args.n_workers,
        n_slots: args.n_slots,
        imagery_path: "synthetic://demo".into(),
        label_path: None,
        imagery_dtype: PixelType::Byte,
        label_dtype: None,
        mode: args.mode.into(),
        window_size: args.window_size,
        band_count: args.band_count,
        bands,
    };
    let chip_len = config.imagery_dtype.word_size() * config.bands.len() * config.window_size * config.window_size;

    reader.start(config)?;
    log::info!("started in {:?} mode, chip size {} bytes", args.mode, chip_len);

    match args.mode {
        CliMode::Inference => {
            let mut buf = vec![0u8; chip_len];
            let ok = reader.get_inference_chip(&mut buf, args.x, args.y, 3);
            log::info!("inference chip at ({}, {}): {}", args.x, args.y, if ok { "ok" } else { "rejected" });
        }
        CliMode::Training | CliMode::Evaluation => {
            let mut buf = vec![0u8; chip_len];
            for i in 0..args.pull_count {
                reader.get_next(&mut buf, None);
                if i % 50 == 0 {
                    log::info!("pulled {i}/{} chips", args.pull_count);
                }
            }
        }
    }

    reader.stop();
    chip_reader::deinit();
    Ok(())
}
