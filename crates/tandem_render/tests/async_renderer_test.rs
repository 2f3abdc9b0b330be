//! Integration tests for the async renderer: access paths, cache staleness,
//! ordering, synchronizing results and teardown.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rand::Rng;
use tandem_core::DispatchError;
use tandem_render::{
    AsyncRenderer, ColorRgba32f, Framebuffer, HeadlessPresenter, IndexFormat, InputElementDesc,
    Journal, JournalEntry, NativeShader, PixelFormat, PresentTarget, Rect, ReferenceRenderer,
    RenderError, RenderResult, RenderTargetKind, Renderer, RendererParameters, ShaderStage,
    StateKey, VertexFormat, Viewport,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Presenter that parks the worker inside `present` until released.
#[derive(Default)]
struct GatePresenter {
    entered: AtomicBool,
    open: Mutex<bool>,
    condvar: Condvar,
}

impl GatePresenter {
    fn wait_entered(&self) {
        while !self.entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn release(&self) {
        *self.open.lock() = true;
        self.condvar.notify_all();
    }
}

impl PresentTarget for GatePresenter {
    fn present(&self, _frame: Arc<Framebuffer>) -> RenderResult<()> {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            self.condvar.wait(&mut open);
        }
        Ok(())
    }
}

/// Presenter whose output surface is gone.
struct LostPresenter;

impl PresentTarget for LostPresenter {
    fn present(&self, _frame: Arc<Framebuffer>) -> RenderResult<()> {
        Err(RenderError::Device("surface lost".to_string()))
    }
}

fn start_with(
    presenter: Arc<dyn PresentTarget>,
    capacity: usize,
) -> (Arc<AsyncRenderer<ReferenceRenderer>>, Journal) {
    init_tracing();
    let mut params = RendererParameters::new(16, 16);
    params.dispatch.queue_capacity = capacity;
    let journal = Journal::new();
    let device = ReferenceRenderer::with_journal(&params, presenter, journal.clone()).unwrap();
    (Arc::new(AsyncRenderer::attach(params, device).unwrap()), journal)
}

fn start() -> (Arc<AsyncRenderer<ReferenceRenderer>>, Journal) {
    start_with(Arc::new(HeadlessPresenter::new()), 32)
}

/// Binds shaders, layout and one vertex buffer so draws validate.
fn bind_pipeline(renderer: &AsyncRenderer<ReferenceRenderer>) {
    let vs = Arc::new(NativeShader::new(ShaderStage::Vertex, "vs"));
    let ps = Arc::new(NativeShader::new(ShaderStage::Pixel, "ps"));
    let layout = renderer
        .create_input_layout_native(
            &[InputElementDesc::new("POSITION", VertexFormat::Float3, 0)],
            &vs,
        )
        .unwrap();
    let buffer = renderer.create_buffer(1024).unwrap();
    renderer.set_vertex_shader(vs).unwrap();
    renderer.set_pixel_shader(ps).unwrap();
    renderer.set_input_layout(layout).unwrap();
    renderer.set_vertex_buffers(0, &[buffer], &[12], &[0]).unwrap();
}

/// Parks the worker in `present` on a helper thread. Returns the gate and the
/// thread that is blocked in `present`.
fn park_worker(
    renderer: &Arc<AsyncRenderer<ReferenceRenderer>>,
    gate: &Arc<GatePresenter>,
) -> thread::JoinHandle<RenderResult<()>> {
    let presenting = {
        let renderer = Arc::clone(renderer);
        thread::spawn(move || renderer.present())
    };
    gate.wait_entered();
    presenting
}

#[test]
fn test_cache_answers_before_worker_executes() {
    let gate = Arc::new(GatePresenter::default());
    let (renderer, journal) = start_with(Arc::clone(&gate) as Arc<dyn PresentTarget>, 32);
    let presenting = park_worker(&renderer, &gate);

    let vs = Arc::new(NativeShader::new(ShaderStage::Vertex, "shadowed_vs"));
    renderer.set_vertex_shader(Arc::clone(&vs)).unwrap();
    let viewport = Viewport::full(4, 4);
    renderer.set_viewport(viewport).unwrap();

    // The worker is still parked; only the cache knows.
    let cached = renderer.vertex_shader().unwrap().unwrap();
    assert!(Arc::ptr_eq(&cached, &vs));
    assert_eq!(renderer.viewport().unwrap(), viewport);
    assert_eq!(renderer.pending_commands(), 2);
    assert_eq!(journal.last_shader(ShaderStage::Vertex), None);

    gate.release();
    presenting.join().unwrap().unwrap();
    renderer.flush().unwrap();
    assert_eq!(
        journal.last_shader(ShaderStage::Vertex).as_deref(),
        Some("shadowed_vs")
    );
}

#[test]
fn test_cache_matches_device_after_concurrent_shader_changes() {
    const PRODUCERS: usize = 4;
    const SWITCHES: usize = 50;

    for _ in 0..20 {
        let (renderer, journal) = start_with(Arc::new(HeadlessPresenter::new()), 1);
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let renderer = Arc::clone(&renderer);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for switch in 0..SWITCHES {
                        let name = format!("vs_{producer}_{switch}");
                        let shader = Arc::new(NativeShader::new(ShaderStage::Vertex, name));
                        renderer.set_vertex_shader(shader).unwrap();
                        if rng.gen_bool(0.2) {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        renderer.flush().unwrap();
        let cached = renderer.vertex_shader().unwrap().unwrap();
        assert_eq!(
            journal.last_shader(ShaderStage::Vertex),
            Some(cached.name.clone()),
            "cache and device disagree on the bound vertex shader"
        );
    }
}

#[test]
fn test_direct_path_bypasses_queue() {
    let gate = Arc::new(GatePresenter::default());
    let (renderer, _journal) = start_with(Arc::clone(&gate) as Arc<dyn PresentTarget>, 32);
    let presenting = park_worker(&renderer, &gate);

    for n in 0..5 {
        renderer.draw(n, 1).unwrap();
    }
    assert_eq!(renderer.pending_commands(), 5);

    // Worker is blocked, yet creation completes and queues nothing.
    let texture = renderer
        .create_tex2d(32, 32, 1, PixelFormat::Rgba8Unorm)
        .unwrap();
    let sampler = renderer.create_sampler(&Default::default()).unwrap();
    assert_eq!(texture.width, 32);
    assert_ne!(texture.id, sampler.id);
    assert_eq!(renderer.pending_commands(), 5);

    gate.release();
    presenting.join().unwrap().unwrap();
}

#[test]
fn test_direct_calls_run_concurrently_with_worker() {
    let (renderer, journal) = start();
    bind_pipeline(&renderer);

    let creators: Vec<_> = (0..4)
        .map(|_| {
            let renderer = Arc::clone(&renderer);
            thread::spawn(move || {
                (0..100)
                    .map(|_| renderer.create_buffer(64).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for n in 0..500 {
        renderer.draw(n, 1).unwrap();
    }

    let mut ids = HashSet::new();
    for creator in creators {
        for id in creator.join().unwrap() {
            assert!(ids.insert(id), "duplicate resource id {id}");
        }
    }
    renderer.flush().unwrap();
    assert_eq!(ids.len(), 400);
    assert_eq!(journal.draws().len(), 500);
}

#[test]
fn test_draws_execute_in_issue_order() {
    let (renderer, journal) = start_with(Arc::new(HeadlessPresenter::new()), 4);
    bind_pipeline(&renderer);
    let indices = renderer.create_buffer(600).unwrap();
    renderer.set_index_buffer(indices, IndexFormat::Uint16).unwrap();

    let mut expected = Vec::new();
    for n in 0..300 {
        if n % 3 == 0 {
            renderer.draw_index(n, 1, -1).unwrap();
            expected.push(JournalEntry::DrawIndexed {
                start_index: n,
                primitive_count: 1,
                base_vertex: -1,
            });
        } else {
            renderer.draw(n, 2).unwrap();
            expected.push(JournalEntry::Draw {
                start_vertex: n,
                primitive_count: 2,
            });
        }
    }
    renderer.flush().unwrap();
    assert_eq!(journal.draws(), expected);
}

#[test]
fn test_each_producer_keeps_its_order() {
    let (renderer, journal) = start_with(Arc::new(HeadlessPresenter::new()), 8);
    bind_pipeline(&renderer);

    let producers = 4usize;
    let per_producer = 100usize;
    let handles: Vec<_> = (0..producers)
        .map(|producer| {
            let renderer = Arc::clone(&renderer);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for n in 0..per_producer {
                    renderer.draw(producer * 1_000 + n, 1).unwrap();
                    if rng.gen_bool(0.1) {
                        thread::sleep(Duration::from_micros(rng.gen_range(0..100)));
                    }
                }
                renderer.flush().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let starts: Vec<usize> = journal
        .draws()
        .into_iter()
        .filter_map(|entry| match entry {
            JournalEntry::Draw { start_vertex, .. } => Some(start_vertex),
            _ => None,
        })
        .collect();
    assert_eq!(starts.len(), producers * per_producer);
    for producer in 0..producers {
        let own: Vec<usize> = starts
            .iter()
            .copied()
            .filter(|s| s / 1_000 == producer)
            .collect();
        let expected: Vec<usize> = (0..per_producer).map(|n| producer * 1_000 + n).collect();
        assert_eq!(own, expected);
    }
}

#[test]
fn test_synchronizing_calls_surface_device_results() {
    let (renderer, journal) = start_with(Arc::new(LostPresenter), 32);

    renderer.flush().unwrap();
    assert!(journal.entries().contains(&JournalEntry::Flush(1)));

    assert_eq!(
        renderer.present(),
        Err(RenderError::Device("surface lost".to_string()))
    );
    // A failed synchronizing call is reported to its caller, not counted as a
    // failed command.
    assert_eq!(renderer.stats().failed, 0);
}

#[test]
fn test_framebuffer_read_back_sees_earlier_clears() {
    let (renderer, _journal) = start();
    let red = ColorRgba32f::new(1.0, 0.0, 0.0, 1.0);
    let blue = ColorRgba32f::new(0.0, 0.0, 1.0, 1.0);

    assert!(renderer.last_framebuffer().is_none());
    renderer.clear_color(0, red).unwrap();
    renderer.clear_color_rect(0, Rect::new(4, 4, 4, 4), blue).unwrap();
    renderer.clear_depth_rect(Rect::new(0, 0, 2, 2), 0.5).unwrap();
    renderer.clear_stencil(7).unwrap();

    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!(framebuffer.pixel(0, 0, 0), Some(red));
    assert_eq!(framebuffer.pixel(0, 5, 5), Some(blue));
    assert_eq!(framebuffer.depth_at(1, 1), Some(0.5));
    assert_eq!(framebuffer.depth_at(3, 3), Some(1.0));
    assert_eq!(framebuffer.stencil_at(15, 15), Some(7));

    let cached = renderer.last_framebuffer().unwrap();
    assert!(Arc::ptr_eq(&cached, &framebuffer));
}

#[test]
fn test_present_reaches_presenter() {
    let presenter = Arc::new(HeadlessPresenter::new());
    let (renderer, journal) = start_with(Arc::clone(&presenter) as Arc<dyn PresentTarget>, 32);

    renderer.present().unwrap();
    renderer.present().unwrap();
    assert_eq!(presenter.frames(), 2);
    assert!(journal
        .entries()
        .contains(&JournalEntry::Present { frame: 2 }));
}

#[test]
fn test_deferred_failures_are_logged_not_returned() {
    let (renderer, journal) = start();

    // No shaders bound: the device rejects every draw.
    assert!(renderer.draw(0, 1).is_ok());
    assert!(renderer.draw(1, 1).is_ok());
    // Wrong stage: rejected by the device, accepted at issue time.
    let blend = Arc::new(NativeShader::new(ShaderStage::Blend, "blend"));
    assert!(renderer.set_pixel_shader(blend).is_ok());
    // Unavailable target: the device has no plane for it.
    assert!(renderer.clear_color(3, ColorRgba32f::BLACK).is_ok());

    renderer.flush().unwrap();
    let stats = renderer.stats();
    assert_eq!(stats.failed, 4);
    assert!(journal.draws().is_empty());
}

#[test]
fn test_untracked_queries_fail_loudly() {
    let (renderer, _journal) = start();

    assert_eq!(
        renderer.index_buffer(),
        Err(RenderError::UntrackedState(StateKey::IndexBuffer))
    );
    assert_eq!(
        renderer.index_format(),
        Err(RenderError::UntrackedState(StateKey::IndexFormat))
    );
    assert_eq!(
        renderer.primitive_topology(),
        Err(RenderError::UntrackedState(StateKey::PrimitiveTopology))
    );
    assert_eq!(
        renderer.rasterizer_state(),
        Err(RenderError::UntrackedState(StateKey::RasterizerState))
    );
    assert_eq!(
        renderer.blend_shader(),
        Err(RenderError::UntrackedState(StateKey::BlendShader))
    );
    assert_eq!(
        renderer.framebuffer_format(),
        Err(RenderError::UntrackedState(StateKey::FramebufferFormat))
    );
    assert_eq!(
        renderer.framebuffer_size(),
        Err(RenderError::UntrackedState(StateKey::FramebufferSize))
    );
    assert_eq!(
        renderer.render_target_available(RenderTargetKind::Color, 0),
        Err(RenderError::UntrackedState(StateKey::RenderTargetAvailable))
    );

    // Tracked but never set.
    assert_eq!(renderer.pixel_shader_code(), Ok(None));
}

#[test]
fn test_shutdown_drains_then_rejects() {
    let (renderer, journal) = start();
    bind_pipeline(&renderer);
    let ps = Arc::new(NativeShader::new(ShaderStage::Pixel, "late_ps"));
    for n in 0..20 {
        renderer.draw(n, 1).unwrap();
    }
    renderer.set_pixel_shader(Arc::clone(&ps)).unwrap();

    renderer.shutdown().unwrap();
    renderer.shutdown().unwrap();
    assert!(!renderer.is_running());

    let entries = journal.entries();
    assert_eq!(journal.draws().len(), 20, "queued draws must drain");
    assert_eq!(entries.last(), Some(&JournalEntry::Released));

    let closed = Err(RenderError::Dispatch(DispatchError::QueueClosed));
    assert_eq!(renderer.draw(0, 1), closed);
    assert_eq!(renderer.flush(), closed);
    assert_eq!(renderer.present(), closed);
    assert!(matches!(
        renderer.framebuffer(),
        Err(RenderError::Dispatch(DispatchError::QueueClosed))
    ));
    assert!(matches!(
        renderer.create_buffer(8),
        Err(RenderError::Dispatch(DispatchError::QueueClosed))
    ));

    // The cache outlives the worker.
    let cached = renderer.pixel_shader().unwrap().unwrap();
    assert!(Arc::ptr_eq(&cached, &ps));
}

#[test]
fn test_run_builds_device_from_parameters() {
    init_tracing();
    let params = RendererParameters::from_toml_str(
        r#"
        width = 32
        height = 24
        format = "rgba32_float"

        [dispatch]
        queue_capacity = 2
        worker_name = "run-test-worker"
        "#,
    )
    .unwrap();
    let renderer = AsyncRenderer::<ReferenceRenderer>::run(
        params,
        Arc::new(HeadlessPresenter::new()),
    )
    .unwrap();

    assert_eq!(renderer.parameters().dispatch.queue_capacity, 2);
    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!((framebuffer.width, framebuffer.height), (32, 24));
    assert_eq!(framebuffer.format, PixelFormat::Rgba32Float);

    renderer.set_framebuffer_size(8, 8, 1).unwrap();
    renderer.set_render_target_available(RenderTargetKind::Color, 1, true).unwrap();
    renderer.clear_color(1, ColorRgba32f::new(0.0, 1.0, 0.0, 1.0)).unwrap();
    let resized = renderer.framebuffer().unwrap();
    assert_eq!((resized.width, resized.height), (8, 8));
    assert_eq!(resized.pixel(1, 7, 7).map(|c| c.g), Some(1.0));
}

#[test]
fn test_typed_uniforms_are_copied_at_issue() {
    let gate = Arc::new(GatePresenter::default());
    let (renderer, journal) = start_with(Arc::clone(&gate) as Arc<dyn PresentTarget>, 32);
    let presenting = park_worker(&renderer, &gate);

    let original = [0.25f32, 0.5, 0.75, 1.0];
    let mut tint = original;
    renderer.set_ps_variable_typed("tint", &tint).unwrap();
    renderer.set_vs_variable_typed("scale", &2.0f32).unwrap();
    renderer.set_vs_variable_pointer("bones", bytemuck::cast_slice(&tint)).unwrap();
    // Reuse the caller's memory before the worker runs anything.
    tint.fill(-1.0);
    assert_eq!(journal.last_variable("set_ps_variable", "tint"), None);

    gate.release();
    presenting.join().unwrap().unwrap();
    renderer.flush().unwrap();
    let expected = bytemuck::cast_slice::<f32, u8>(&original).to_vec();
    assert_eq!(journal.last_variable("set_ps_variable", "tint"), Some(expected.clone()));
    assert_eq!(journal.last_variable("set_vs_variable_pointer", "bones"), Some(expected));
    assert_eq!(
        journal.last_variable("set_vs_variable_value", "scale"),
        Some(2.0f32.to_ne_bytes().to_vec())
    );
    assert_eq!(renderer.stats().failed, 0);
}
