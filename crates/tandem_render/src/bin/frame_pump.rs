//! # Frame Pump
//!
//! Drives the reference device through the async renderer for a number of
//! frames and prints dispatch statistics.
//!
//! ```text
//! frame_pump [renderer.toml] [--frames N]
//! RUST_LOG=tandem_core=debug frame_pump
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use tandem_render::{
    AsyncRenderer, ColorRgba32f, HeadlessPresenter, IndexFormat, InputElementDesc, NativeShader,
    PresentTarget, Rect, ReferenceRenderer, RenderResult, Renderer, RendererParameters,
    ShaderStage, VertexFormat,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_FRAMES: u64 = 120;
const DRAWS_PER_FRAME: usize = 64;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Transform {
    scale: [f32; 4],
    offset: [f32; 4],
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let frames = args
        .iter()
        .position(|a| a == "--frames")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    let config_path = args
        .iter()
        .enumerate()
        .find(|(i, a)| !a.starts_with("--") && (*i == 0 || args[i - 1] != "--frames"))
        .map(|(_, a)| a.clone());

    match run(config_path.as_deref(), frames) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "frame pump failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<&str>, frames: u64) -> RenderResult<()> {
    let params = match config_path {
        Some(path) => RendererParameters::load(path)?,
        None => RendererParameters::default(),
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TANDEM FRAME PUMP                                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!(
        "  {}x{} x{} {:?}, queue capacity {}",
        params.width, params.height, params.samples, params.format, params.dispatch.queue_capacity
    );

    let presenter = Arc::new(HeadlessPresenter::new());
    let renderer = AsyncRenderer::<ReferenceRenderer>::run(
        params,
        Arc::clone(&presenter) as Arc<dyn PresentTarget>,
    )?;

    // Direct path: resources are ready before anything is queued.
    let vs = Arc::new(NativeShader::new(ShaderStage::Vertex, "pump_vs"));
    let ps = Arc::new(NativeShader::new(ShaderStage::Pixel, "pump_ps"));
    let layout = renderer.create_input_layout_native(
        &[
            InputElementDesc::new("POSITION", VertexFormat::Float3, 0),
            InputElementDesc::new("TEXCOORD", VertexFormat::Float2, 12),
        ],
        &vs,
    )?;
    let vertices = renderer.create_buffer(20 * 4 * DRAWS_PER_FRAME)?;
    let indices = renderer.create_buffer(2 * 6 * DRAWS_PER_FRAME)?;

    renderer.set_input_layout(layout)?;
    renderer.set_vertex_buffers(0, &[vertices], &[20], &[0])?;
    renderer.set_index_buffer(indices, IndexFormat::Uint16)?;
    renderer.set_vertex_shader(vs)?;
    renderer.set_pixel_shader(ps)?;

    let started = Instant::now();
    for frame in 0..frames {
        #[allow(clippy::cast_precision_loss)]
        let t = frame as f32 / frames.max(1) as f32;
        renderer.clear_color(0, ColorRgba32f::new(t, 0.1, 1.0 - t, 1.0))?;
        renderer.clear_depth(1.0)?;
        for quad in 0..DRAWS_PER_FRAME {
            #[allow(clippy::cast_precision_loss)]
            let transform = Transform {
                scale: [1.0; 4],
                offset: [quad as f32, t, 0.0, 0.0],
            };
            renderer.set_vs_variable_typed("transform", &transform)?;
            renderer.draw_index(quad * 6, 2, 0)?;
        }
        renderer.clear_stencil_rect(Rect::new(0, 0, 16, 16), 1)?;
        renderer.present()?;
    }
    let elapsed = started.elapsed();

    let framebuffer = renderer.framebuffer()?;
    renderer.shutdown()?;
    let stats = renderer.stats();

    println!();
    println!("┌─ RESULTS ────────────────────────────────────────────────────────┐");
    println!("│ Frames presented:   {}", presenter.frames());
    println!("│ Draw calls:         {}", framebuffer.draw_calls);
    println!("│ Primitives:         {}", framebuffer.primitives);
    println!("│ Commands submitted: {}", stats.submitted);
    println!("│ Commands failed:    {}", stats.failed);
    println!("│ Barriers:           {}", stats.barriers);
    println!("│ Elapsed:            {elapsed:.2?}");
    println!("└──────────────────────────────────────────────────────────────────┘");
    Ok(())
}
