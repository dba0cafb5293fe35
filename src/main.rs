//! Dice Tray entry point
//!
//! On the web: boots the engine, wires transports, renderer and page controls,
//! and drives the frame loop. Natively: a headless roll tool.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod web_client {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, HtmlInputElement, HtmlSelectElement};

    use dice_tray::engine::{DiceEngine, EngineConfig, EngineStatus};
    use dice_tray::error::RenderError;
    use dice_tray::history::RollHistory;
    use dice_tray::platform;
    use dice_tray::renderer::DiceRenderState;
    use dice_tray::settings::EngineSettings;
    use dice_tray::sim::{ModelRegistry, RollResult};
    use dice_tray::transport::web::{
        BroadcastChannelTransport, SharedWorkerTransport, WebSocketRelay,
    };

    /// Shared-worker hub script, served next to the wasm bundle
    const HUB_SCRIPT: &str = "dice_hub.js";
    /// Transport polling and safety-timer check interval
    const POLL_INTERVAL_MS: i32 = 50;
    const DEFAULT_ROOM: &str = "lobby";

    type SharedEngine = Rc<RefCell<DiceEngine>>;

    /// `?room=`, `?relay=` and `?name=` query parameters
    fn query_param(name: &str) -> Option<String> {
        let search = web_sys::window()?.location().search().ok()?;
        let params = web_sys::UrlSearchParams::new_with_str(&search).ok()?;
        params.get(name).filter(|v| !v.is_empty())
    }

    fn set_text(id: &str, text: &str) {
        if let Some(el) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(id))
        {
            el.set_text_content(Some(text));
        }
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn render_history(history: &RollHistory) {
        let Some(list) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id("dice-log"))
        else {
            return;
        };
        let items: String = history
            .entries()
            .iter()
            .map(|e| {
                format!(
                    "<li><b>{}</b> {}</li>",
                    escape_html(&e.result.triggered_by),
                    escape_html(&e.result.summary())
                )
            })
            .collect();
        list.set_inner_html(&items);
    }

    async fn init_renderer(canvas: HtmlCanvasElement) -> Result<DiceRenderState, RenderError> {
        let width = canvas.width();
        let height = canvas.height();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| RenderError::Adapter(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Adapter(e.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        DiceRenderState::new(surface, &adapter, width, height).await
    }

    fn connect_transports(engine: &SharedEngine, room: &str) {
        let mut engine = engine.borrow_mut();
        match BroadcastChannelTransport::open(room) {
            Ok(t) => engine.add_transport(Box::new(t)),
            Err(e) => log::warn!("{e}"),
        }
        match SharedWorkerTransport::connect(HUB_SCRIPT, room) {
            Ok(t) => engine.add_transport(Box::new(t)),
            Err(e) => log::warn!("{e}"),
        }
        if let Some(url) = query_param("relay") {
            match WebSocketRelay::connect(&url) {
                Ok(t) => engine.add_transport(Box::new(t)),
                Err(e) => log::warn!("{e}"),
            }
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Dice Tray starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");

        let dpr = window.device_pixel_ratio();
        canvas.set_width((canvas.client_width() as f64 * dpr) as u32);
        canvas.set_height((canvas.client_height() as f64 * dpr) as u32);

        let room = query_param("room").unwrap_or_else(|| DEFAULT_ROOM.to_string());
        let mut settings = EngineSettings::load();
        if let Some(name) = query_param("name") {
            settings = settings.with_display_name(name);
            settings.save();
        }
        let config = EngineConfig {
            room: room.clone(),
            instance_id: platform::new_instance_id(),
            settings,
        };
        let engine: SharedEngine = Rc::new(RefCell::new(DiceEngine::new(config)));
        set_text("room-name", &room);

        // Dice log
        let history = Rc::new(RefCell::new(RollHistory::load(&room)));
        render_history(&history.borrow());
        {
            let history = history.clone();
            let room = room.clone();
            engine
                .borrow_mut()
                .set_on_settled(move |result: &RollResult| {
                    let mut history = history.borrow_mut();
                    history.record(result.clone(), platform::now_ms());
                    history.save(&room);
                    render_history(&history);
                    set_text("last-result", &result.summary());
                });
        }

        connect_transports(&engine, &room);

        let poll_handle = Rc::new(Cell::new(None));
        start_polling(engine.clone(), poll_handle.clone());
        setup_roll_button(engine.clone());
        setup_teardown(engine.clone(), poll_handle);

        // Frames run from now on; rolls before the load completes are queued
        request_animation_frame(engine.clone());

        match init_renderer(canvas).await {
            Ok(renderer) => engine.borrow_mut().set_renderer(Box::new(renderer)),
            Err(e) => log::warn!("Rendering unavailable, rolling without visuals: {e}"),
        }
        let ready = {
            let mut engine = engine.borrow_mut();
            engine.on_assets_loaded(ModelRegistry::builtin(), platform::now_ms());
            engine.registry().is_some()
        };

        // Hide loading indicator once the models are installed
        if ready {
            if let Some(loading) = document.get_element_by_id("loading") {
                let _ = loading.set_attribute("class", "hidden");
            }
        }

        log::info!("Dice Tray running in room {room}");
    }

    fn start_polling(engine: SharedEngine, handle: Rc<Cell<Option<i32>>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut()>::new(move || {
            let now = platform::now_ms();
            let mut engine = engine.borrow_mut();
            engine.poll_transports(now);
            // Keeps firing when frames are throttled
            engine.on_timer(now);
        });
        match window.set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            POLL_INTERVAL_MS,
        ) {
            Ok(id) => handle.set(Some(id)),
            Err(_) => log::warn!("Could not start transport polling"),
        }
        closure.forget();
    }

    fn setup_roll_button(engine: SharedEngine) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let Some(button) = document.get_element_by_id("roll-button") else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let count = document
                .get_element_by_id("dice-count")
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                .and_then(|input| input.value().parse::<u32>().ok())
                .unwrap_or(1);
            let sides = document
                .get_element_by_id("dice-sides")
                .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
                .and_then(|select| select.value().parse::<u32>().ok())
                .unwrap_or(6);

            if let Err(e) = engine
                .borrow_mut()
                .trigger_roll(count, sides, platform::now_ms())
            {
                set_text("last-result", &e.to_string());
            }
        });
        let _ = button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_teardown(engine: SharedEngine, poll_handle: Rc<Cell<Option<i32>>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            if let (Some(window), Some(id)) = (web_sys::window(), poll_handle.take()) {
                window.clear_interval_with_handle(id);
            }
            engine.borrow_mut().teardown();
        });
        let _ = window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(engine: SharedEngine) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |_time: f64| {
            frame_loop(engine);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn frame_loop(engine: SharedEngine) {
        let status = {
            let mut e = engine.borrow_mut();
            let now = platform::now_ms();
            e.on_frame(now);
            e.on_timer(now);
            e.status()
        };
        set_text("status", status.label());

        if status != EngineStatus::TornDown {
            request_animation_frame(engine);
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    web_client::run().await;
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use clap::Parser;

    use dice_tray::sim::{
        FramePacing, ModelRegistry, RollRequest, SettleConfig, fresh_seed, simulate_roll,
    };

    /// Roll dice headlessly with the same simulation the web client runs
    #[derive(Parser, Debug)]
    #[command(name = "dice-tray", version, about)]
    pub struct Args {
        /// Roll seed (random when omitted)
        #[arg(long)]
        pub seed: Option<u32>,
        /// Number of dice
        #[arg(long, default_value_t = 1)]
        pub count: u32,
        /// Die type (4, 6, 8, 10, 12 or 20)
        #[arg(long, default_value_t = 6)]
        pub sides: u32,
        /// Name recorded as the roller
        #[arg(long, default_value = "cli")]
        pub name: String,
        /// Print the full result as JSON
        #[arg(long)]
        pub json: bool,
        /// Physics steps per frame (does not change the result)
        #[arg(long, default_value_t = 1)]
        pub substeps: u32,
    }

    pub fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
        let pacing = FramePacing {
            substeps: args.substeps,
            ..FramePacing::default()
        }
        .validated();

        let seed = args.seed.unwrap_or_else(fresh_seed);
        let request = RollRequest::new(seed, args.count, args.sides, "cli", "cli")?
            .with_triggered_by(args.name);
        let registry = ModelRegistry::builtin()?;

        let roll = simulate_roll(&registry, &request, &SettleConfig::default(), pacing)?;
        log::info!(
            "Settled ({:?}) after {:.0} ms, {} steps in {} frames",
            roll.reason,
            roll.elapsed_ms,
            roll.steps,
            roll.frames
        );

        if args.json {
            println!("{}", serde_json::to_string_pretty(&roll.result)?);
        } else {
            println!("seed {seed}: {}", roll.result.summary());
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use clap::Parser;

    env_logger::init();
    let args = cli::Args::parse();
    if let Err(e) = cli::run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
