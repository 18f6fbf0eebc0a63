use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use compute_forge::{
    GraphExecution, GraphProxy, GraphScheduler, RecordingGraphBuilder, SchedulerConfig,
    SubmitReport, asset,
    kernel::{FeatureLevel, KernelResource},
    render_graph::{RecordedPass, WgpuGraphBuilder, WgpuKernelLibrary},
    scheduler::ExecutionGroup,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Cli {
    graph_json: Option<PathBuf>,
    frames: u32,
    config: Option<PathBuf>,
    gpu: bool,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            graph_json: None,
            frames: 1,
            config: None,
            gpu: false,
        }
    }
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--graph-json" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --graph-json"));
                };
                cli.graph_json = Some(PathBuf::from(v));
                i += 2;
            }
            "--frames" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --frames"));
                };
                cli.frames = v
                    .parse()
                    .map_err(|e| anyhow!("invalid --frames value {v}: {e}"))?;
                i += 2;
            }
            "--config" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --config"));
                };
                cli.config = Some(PathBuf::from(v));
                i += 2;
            }
            "--gpu" => {
                cli.gpu = true;
                i += 1;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --graph-json <graph.json>, --frames <n>, --config <config.json>, --gpu)"
                ));
            }
        }
    }
    Ok(cli)
}

#[derive(Serialize)]
struct FrameOutput {
    frame: u32,
    report: SubmitReport,
    passes: Vec<RecordedPass>,
}

fn run_frames(
    graph_json: &std::path::Path,
    frames: u32,
    config: SchedulerConfig,
) -> Result<Vec<FrameOutput>> {
    let (graph, base_dir) = asset::load_graph_asset(graph_json)?;
    let source = graph
        .immediate_graph_source(&base_dir)
        .with_context(|| format!("failed to prepare graph {}", graph.name))?;
    let proxy = Arc::new(
        GraphProxy::initialize(&source)
            .with_context(|| format!("failed to build graph proxy for {}", graph.name))?,
    );
    info!(
        graph = %graph.name,
        kernels = proxy.kernel_invocations().len(),
        "loaded compute graph"
    );

    let mut scheduler = GraphScheduler::new(config);
    let mut out = Vec::with_capacity(frames as usize);
    for frame in 0..frames {
        let mut builder = RecordingGraphBuilder::new();
        let owner = format!("{}#{frame}", graph.name);
        scheduler.enqueue_execution(
            ExecutionGroup::IMMEDIATE,
            GraphExecution::new(owner.clone(), proxy.clone(), graph.build_providers())
                .with_constants(graph.constants.clone())
                .with_fallback(move || eprintln!("[fallback] {owner}: execution skipped")),
        );
        let report = scheduler.submit_work(
            &mut builder,
            &ExecutionGroup::IMMEDIATE,
            FeatureLevel::default(),
        );
        builder.execute();
        out.push(FrameOutput {
            frame,
            report,
            passes: builder.passes().to_vec(),
        });
    }
    Ok(out)
}

#[derive(Serialize)]
struct GpuFrameOutput {
    frame: u32,
    report: SubmitReport,
    dispatched: usize,
    compiled: usize,
}

fn create_device() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("wgpu: no suitable adapter found: {e}"))?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("compute-forge"),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("wgpu: request_device failed: {e}"))?;
        Ok::<_, anyhow::Error>((Arc::new(device), Arc::new(queue)))
    })
}

/// Same frame loop on a real device. Kernel permutations compile between
/// frames, so the first frame that requests one falls back.
fn run_frames_gpu(
    graph_json: &std::path::Path,
    frames: u32,
    config: SchedulerConfig,
) -> Result<Vec<GpuFrameOutput>> {
    let (graph, base_dir) = asset::load_graph_asset(graph_json)?;
    let (device, queue) = create_device()?;
    let library = WgpuKernelLibrary::new(device.clone());
    let source = graph
        .graph_source(&base_dir, |kernel| {
            let resource: Arc<dyn KernelResource> = library.register_kernel(
                kernel.asset.name.clone(),
                kernel.source,
                kernel.reflection.entry_point.clone(),
                kernel.domain.clone(),
            )?;
            Ok(Some(resource))
        })
        .with_context(|| format!("failed to prepare graph {}", graph.name))?;
    let proxy = Arc::new(
        GraphProxy::initialize(&source)
            .with_context(|| format!("failed to build graph proxy for {}", graph.name))?,
    );

    let mut scheduler = GraphScheduler::new(config);
    let mut builder = WgpuGraphBuilder::new(device, queue, library.clone());
    let mut out = Vec::with_capacity(frames as usize);
    for frame in 0..frames {
        let owner = format!("{}#{frame}", graph.name);
        scheduler.enqueue_execution(
            ExecutionGroup::IMMEDIATE,
            GraphExecution::new(owner, proxy.clone(), graph.build_providers())
                .with_constants(graph.constants.clone()),
        );
        let report = scheduler.submit_work(
            &mut builder,
            &ExecutionGroup::IMMEDIATE,
            FeatureLevel::default(),
        );
        let dispatched = builder.execute()?;
        let compiled = library.compile_pending()?;
        out.push(GpuFrameOutput {
            frame,
            report,
            dispatched,
            compiled,
        });
    }
    Ok(out)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    let graph_json = cli
        .graph_json
        .ok_or_else(|| anyhow!("--graph-json <graph.json> is required"))?;
    let config = match cli.config.as_deref() {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };

    let text = if cli.gpu {
        serde_json::to_string_pretty(&run_frames_gpu(&graph_json, cli.frames, config)?)?
    } else {
        serde_json::to_string_pretty(&run_frames(&graph_json, cli.frames, config)?)?
    };
    println!("{text}");
    Ok(())
}
