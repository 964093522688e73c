use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;
use clap::Parser;
use shiftresnet::models::resnet::{PREFAB_RESNET_MAP, ReductionMode, ResNet, ResNetMeta};
use tracing_subscriber::EnvFilter;

// $ --prefab=shiftresnet56 --expansion=6 --num-classes=100
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Prefab model config name; see `--list`.
    #[arg(long, default_value = "resnet20")]
    prefab: String,

    /// List the available prefabs and exit.
    #[arg(long)]
    list: bool,

    /// Override the number of classes.
    #[arg(long)]
    num_classes: Option<usize>,

    /// Override the channel reduction factor.
    #[arg(long)]
    reduction: Option<f64>,

    /// Override where the reduction applies: "net" or "block".
    #[arg(long)]
    reduction_mode: Option<ReductionMode>,

    /// Override the shift block expansion.
    #[arg(long)]
    expansion: Option<f64>,

    /// Batch size of the random input.
    #[arg(short, long, default_value_t = 2)]
    batch_size: usize,

    /// Square input resolution; sets the head pool size. Must be a multiple of the network stride.
    #[arg(long)]
    resolution: Option<usize>,

    /// Random seed for reproducibility.
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Write the structure config as JSON to this path.
    #[arg(long)]
    save_config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list {
        println!("Available prefabs:");
        for prefab in PREFAB_RESNET_MAP.items {
            println!("* \"{}\": {}", prefab.name, prefab.description);
        }
        return Ok(());
    }

    summarize::<NdArray>(&args)
}

pub fn summarize<B: Backend>(args: &Args) -> anyhow::Result<()> {
    let device: B::Device = Default::default();
    B::seed(args.seed);

    let prefab = PREFAB_RESNET_MAP
        .lookup_prefab(&args.prefab)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown prefab \"{}\"; expected one of: {:?}",
                args.prefab,
                PREFAB_RESNET_MAP.names()
            )
        })?;

    let mut config = prefab.to_config();
    if let Some(num_classes) = args.num_classes {
        config = config.with_num_classes(num_classes);
    }
    if let Some(reduction) = args.reduction {
        config = config.with_reduction(reduction);
    }
    if let Some(reduction_mode) = args.reduction_mode {
        config = config.with_reduction_mode(reduction_mode);
    }
    if let Some(expansion) = args.expansion {
        config = config.with_expansion(expansion);
    }
    if let Some(resolution) = args.resolution {
        config = config
            .with_input_resolution(resolution)
            .map_err(anyhow::Error::msg)?;
    }
    config.try_validate().map_err(anyhow::Error::msg)?;

    tracing::info!(
        prefab = prefab.name,
        depth = config.depth(),
        block = ?config.block,
        stage_planes = ?config.stage_planes(),
        pool_size = config.pool_size,
        "building model"
    );

    let structure = config.to_structure();
    structure.try_validate().map_err(anyhow::Error::msg)?;

    if let Some(path) = &args.save_config {
        structure.save(path)?;
        tracing::info!(path = path.as_str(), "saved structure config");
    }

    let model: ResNet<B> = structure.init(&device);

    let [height, width] = model.input_resolution();
    let input_shape = [args.batch_size, model.in_channels(), height, width];
    let input = Tensor::<B, 4>::random(input_shape, Distribution::Default, &device);
    let output = model.forward(input);

    tracing::info!(
        input = ?input_shape,
        output = ?output.dims(),
        num_params = model.num_params(),
        "forward pass"
    );

    println!("{}", prefab.name);
    println!("  stages:      {}", model.layers.len());
    println!(
        "  blocks:      {:?}",
        model
            .layers
            .iter()
            .map(|layer| layer.blocks.len())
            .collect::<Vec<_>>()
    );
    println!("  head planes: {}", model.head_planes());
    println!("  input:       {input_shape:?}");
    println!("  output:      {:?}", output.dims());
    println!("  parameters:  {}", model.num_params());

    Ok(())
}
