//! plotline demo
//!
//! Generates random-walk series and runs them through the sampling worker,
//! the chart context and the multi-series renderer, logging what each
//! stage produced.

mod mock;

use chrono::Utc;
use clap::Parser;
use plotline_core::{DeviceType, SamplingAlgorithm, SamplingConfig};
use plotline_state::{ChartConfig, ChartContext, LineChartConfig, render_lines};
use plotline_worker::{OffloadScheduler, SamplingManager, WorkerConfig, WorkerHandle};
use tracing_subscriber::EnvFilter;

use crate::mock::{MockSeries, generate_lines, run_live_feed};

#[derive(Parser, Debug)]
#[command(name = "plotline-demo", version, about = "Run the plotline pipeline over generated series")]
struct Args {
    /// Points in the primary series
    #[arg(long, default_value_t = 100_000)]
    points: usize,

    /// Series rendered on the multi-line chart
    #[arg(long, default_value_t = 3)]
    series: usize,

    /// Sampling algorithm; picked from the data when omitted
    #[arg(long)]
    algorithm: Option<SamplingAlgorithm>,

    /// Point budget
    #[arg(long, default_value_t = 800)]
    target: usize,

    /// mobile, tablet, desktop or high-performance
    #[arg(long, default_value_t = DeviceType::Desktop, value_parser = clap::value_parser!(DeviceType))]
    device: DeviceType,

    /// Chart width in pixels
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Live updates to stream into the chart context (0 to skip)
    #[arg(long, default_value_t = 0)]
    live_ticks: usize,

    /// Points above which work is sent to the worker thread
    #[arg(long, default_value_t = plotline_worker::DEFAULT_OFFLOAD_THRESHOLD)]
    offload_threshold: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::info!(?args, "plotline demo");

    let start = Utc::now() - chrono::Duration::minutes(args.points as i64);
    let mut primary = MockSeries::new(100.0, start);
    let data = primary.generate(args.points);

    // ------------------------------------------------------------------
    // Worker: analysis, sampling, benchmark
    // ------------------------------------------------------------------
    let worker = WorkerHandle::spawn(WorkerConfig::default().threshold(args.offload_threshold))?;
    worker.ready().await?;

    let analysis = worker.analyze(data.clone(), "value").await?;
    let algorithm = args.algorithm.unwrap_or(analysis.recommended_algorithm);
    tracing::info!(
        volatility = ?analysis.volatility,
        recommended = %analysis.recommended_algorithm,
        using = %algorithm,
        "analyzed primary series"
    );

    let stats = worker.statistics(data.clone(), "value").await?;
    tracing::info!(
        min = %format!("{:.2}", stats.min),
        max = %format!("{:.2}", stats.max),
        mean = %format!("{:.2}", stats.mean),
        count = stats.count,
        "primary series statistics"
    );

    let sampling = SamplingConfig::new(algorithm, args.target).with_x_key("date");
    let outcome = worker.sample(data.clone(), sampling.clone()).await?;
    tracing::info!(
        original = outcome.original_length,
        sampled = outcome.sampled_length,
        ms = %format!("{:.2}", outcome.processing_time),
        ratio = %format!("{:.1}", outcome.compression_ratio),
        "sampled primary series"
    );

    let benchmark = worker
        .benchmark(data.clone(), SamplingAlgorithm::ALL.to_vec(), args.target)
        .await?;
    for entry in &benchmark.results {
        tracing::info!(
            algorithm = %entry.algorithm,
            ms = %format!("{:.2}", entry.processing_time),
            points = entry.sampled_points,
            success = entry.success,
            "benchmark"
        );
    }

    let datasets = vec![data.clone(), primary.generate(args.points / 4)];
    let configs = vec![sampling.clone(), sampling.clone()];
    let batch = worker
        .batch_with_progress(datasets, configs, |progress| {
            tracing::info!(
                completed = progress.completed,
                total = progress.total,
                percentage = progress.percentage,
                "batch progress"
            );
        })
        .await?;
    tracing::info!(
        datasets = batch.datasets_processed,
        ms = %format!("{:.2}", batch.total_processing_time),
        "batch sampled"
    );
    worker.terminate();

    // ------------------------------------------------------------------
    // Per-chart sampling budget
    // ------------------------------------------------------------------
    let manager = SamplingManager::new(OffloadScheduler::new(
        WorkerConfig::default().threshold(args.offload_threshold),
    ));
    let for_chart = manager.sample_for_chart(&data, args.width, args.device).await;
    tracing::info!(
        device = ?args.device,
        width = args.width,
        points = for_chart.len(),
        "sampled for chart width"
    );
    manager.terminate();

    // ------------------------------------------------------------------
    // Chart context
    // ------------------------------------------------------------------
    let config = ChartConfig::new(args.width, args.width * 0.5)
        .x_key("date")
        .device(args.device)
        .sampling(sampling);
    let ctx = ChartContext::new(config.clone());
    ctx.register_chart(LineChartConfig::new("value").with_handle("price-chart"));
    ctx.register_chart(LineChartConfig::new("volume").with_handle("volume-chart").stroke_width(1.0));
    ctx.set_data(data.clone());

    match ctx.processed_data() {
        Some(processed) => tracing::info!(
            original = processed.original_length,
            sampled = processed.sampled_data.len(),
            series = ?processed.numeric_keys,
            y_domain = ?processed.y_domain,
            "chart data processed"
        ),
        None => tracing::warn!(error = ?ctx.error(), "chart data unavailable"),
    }
    for (id, chart) in ctx.all_chart_configs() {
        if let Some(line) = ctx.line_for_chart(&id) {
            tracing::info!(
                chart = %id,
                handle = ?chart.handle,
                data_key = %chart.data_key,
                points = line.points.len(),
                path_bytes = line.path.len(),
                "line rendered"
            );
        }
    }

    if args.live_ticks > 0 {
        run_live_feed(&ctx, primary, data, args.live_ticks).await;
    }

    ctx.log_performance();
    tracing::debug!(summary = %serde_json::to_string(&ctx.performance())?, "chart context performance");
    ctx.destroy();

    // ------------------------------------------------------------------
    // Multi-series render
    // ------------------------------------------------------------------
    let scheduler = OffloadScheduler::new(WorkerConfig::default().threshold(args.offload_threshold));
    let lines = generate_lines(args.series, args.points, start);
    let render = render_lines(&lines, &config, &scheduler).await?;
    if let Some(metadata) = &render.metadata {
        tracing::info!(
            lines = metadata.lines_processed,
            unified = metadata.unified_x_values,
            original = metadata.original_points,
            sampled = metadata.sampled_points,
            "series aligned"
        );
    }
    for series in &render.series {
        tracing::info!(
            id = %series.id,
            color = %series.color,
            points = series.points.len(),
            "series rendered"
        );
    }
    tracing::info!(ticks = ?render.y_ticks, "y axis");
    scheduler.terminate();

    Ok(())
}
