use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use sunspec_rs::model::{BaseType, ChainedSchemaSource};
use sunspec_rs::util::{decode_hex, format_hex_compact};
use sunspec_rs::{
    init_logger, log_info, BuiltinSchemaSource, Device, DirSchemaSource, Model, ModelHandle,
    RtuConfig, RtuTransport, SchemaRegistry, SerialLink,
};

#[derive(Parser)]
#[command(name = "sunspec-cli")]
#[command(about = "CLI tool for SunSpec devices over Modbus RTU")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LinkArgs {
    /// Serial port, e.g. /dev/ttyUSB0
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,
    #[arg(short, long, global = true)]
    slave: Option<u8>,
    #[arg(short, long, global = true)]
    baud: Option<u32>,
    /// JSON file with RTU settings; flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory with model_NNNNN.json definitions, searched before the built-in set
    #[arg(short, long, global = true)]
    models: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the models found on the device
    Scan,
    /// Read and print every model
    Dump,
    /// Print one point
    Get {
        /// Model id or name
        model: String,
        point: String,
        #[arg(long, default_value = "1")]
        index: u16,
        #[arg(long, default_value = "0")]
        block: usize,
        /// Print a string point as raw hex bytes
        #[arg(long)]
        hex: bool,
    },
    /// Write one point
    Set {
        model: String,
        point: String,
        value: String,
        #[arg(long, default_value = "1")]
        index: u16,
        #[arg(long, default_value = "0")]
        block: usize,
        /// Take the value of a string point as hex bytes, e.g. "32 35 b0 43"
        #[arg(long)]
        hex: bool,
    },
}

impl LinkArgs {
    fn rtu_config(&self) -> Result<RtuConfig> {
        let mut config = match &self.config {
            Some(path) => RtuConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RtuConfig::default(),
        };
        if let Some(slave) = self.slave {
            config.slave_id = slave;
        }
        if let Some(baud) = self.baud {
            config.baudrate = baud;
        }
        Ok(config)
    }

    fn registry(&self) -> SchemaRegistry {
        match &self.models {
            Some(dir) => SchemaRegistry::new(ChainedSchemaSource::new(vec![
                Box::new(DirSchemaSource::new(dir)),
                Box::new(BuiltinSchemaSource),
            ])),
            None => SchemaRegistry::builtin(),
        }
    }
}

type RtuDevice = Device<RtuTransport<SerialLink>>;

fn find_model(device: &RtuDevice, model: &str, index: u16) -> Result<ModelHandle> {
    let handle = match model.parse::<u16>() {
        Ok(id) => device.model(id, index),
        Err(_) => device.model_by_name(model, index),
    };
    handle.with_context(|| format!("model {model} index {index}"))
}

fn set_point(model: &mut Model, id: &str, block: usize, text: &str, hex: bool) -> Result<()> {
    let point = model
        .point(id, block)
        .ok_or_else(|| anyhow!("no point {id} in block {block}"))?;
    let base = point.data_type().base;
    let scaled = point.scale_factor().is_some();

    if hex {
        if base != BaseType::String {
            return Err(anyhow!("--hex only applies to string points, {id} is {base}"));
        }
        let bytes = decode_hex(text).with_context(|| format!("value for {id}"))?;
        model.set_string_bytes(id, block, &bytes)?;
        return Ok(());
    }

    match base {
        BaseType::String => model.set_string(id, block, text)?,
        BaseType::Float32 => model.set_float32(id, block, text.parse()?)?,
        _ if scaled => model.set_float32(id, block, text.parse()?)?,
        BaseType::Int16 => model.set_int16(id, block, text.parse()?, 0)?,
        BaseType::Uint16 => model.set_uint16(id, block, text.parse()?, 0)?,
        BaseType::Int32 => model.set_int32(id, block, text.parse()?, 0)?,
        BaseType::Uint32 => model.set_uint32(id, block, text.parse()?, 0)?,
        BaseType::Int64 => model.set_int64(id, block, text.parse()?, 0)?,
        BaseType::Uint64 => model.set_uint64(id, block, text.parse()?, 0)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = cli.link.rtu_config()?;
    let mut registry = cli.link.registry();

    let mut device = sunspec_rs::connect(&cli.link.port, config)
        .await
        .with_context(|| format!("opening {}", cli.link.port))?;
    let count = device.scan(&mut registry).await.context("scanning device")?;
    log_info(&format!("Found {count} models"));

    match cli.command {
        Commands::Scan => {
            for model in device.models() {
                println!(
                    "{:>5} {:<16} index {} addr {} len {}",
                    model.id(),
                    model.name(),
                    model.index(),
                    model.addr(),
                    model.len()
                );
            }
        }
        Commands::Dump => {
            device.read_all().await?;
            print!("{device}");
        }
        Commands::Get {
            model,
            point,
            index,
            block,
            hex,
        } => {
            let handle = find_model(&device, &model, index)?;
            device.read_model(handle).await?;
            let model = device.get(handle)?;
            let p = model
                .point(&point, block)
                .ok_or_else(|| anyhow!("no point {point} in block {block}"))?;
            if hex {
                let bytes = model.get_string_bytes(&point, block)?;
                println!("{}: {}", point, format_hex_compact(bytes));
            } else {
                println!("{}: {}", point, p.format_value(model.effective_scale_factor(p)));
            }
        }
        Commands::Set {
            model,
            point,
            value,
            index,
            block,
            hex,
        } => {
            let handle = find_model(&device, &model, index)?;
            device.read_model(handle).await?;
            set_point(device.get_mut(handle)?, &point, block, &value, hex)?;
            device.write_model(handle).await?;
            log_info(&format!("Wrote {point} = {value}"));
        }
    }

    sunspec_rs::disconnect(&mut device).await?;
    Ok(())
}
