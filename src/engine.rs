//! Roll lifecycle
//!
//! The engine owns everything roll-scoped (the active world and its detector)
//! and everything process-scoped (model registry, renderer, transports). It is
//! driven entirely by callbacks carrying the driver's clock in ms:
//! - `on_frame` - one frame: one physics step, settlement check, render
//! - `on_timer` - safety timer at the roll's hard cap
//! - `poll_transports` / `handle_frame` - incoming rolls
//! - `on_assets_loaded` - completion of the one-time async load
//!
//! A browser driver calls these from `requestAnimationFrame` and timers; tests
//! call them with a manual clock. The clock only schedules work: a roll settles
//! on a physics step count, so its values never depend on frame timing.

use crate::error::{AssetError, RollError};
use crate::renderer::DiceRenderer;
use crate::settings::EngineSettings;
use crate::sim::{
    ColliderKind, DieVisual, ModelRegistry, PhysicsWorld, RollKey, RollPhase, RollRequest,
    RollResult, SettleConfig, SettleReason, SettlementDetector, fresh_seed, resolve_values,
    step_once, step_to_settlement,
};
use crate::transport::{RollMessage, RollTransport, TransportHub, decode_frame};

/// Identity and preferences of one client
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub room: String,
    /// Unique per tab; used to ignore our own broadcasts
    pub instance_id: String,
    pub settings: EngineSettings,
}

impl EngineConfig {
    pub fn new(room: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            instance_id: instance_id.into(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Externally visible engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Assets not loaded yet; rolls are queued
    Loading,
    Idle,
    Rolling,
    Settled,
    TornDown,
}

impl EngineStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EngineStatus::Loading => "loading",
            EngineStatus::Idle => "ready",
            EngineStatus::Rolling => "rolling",
            EngineStatus::Settled => "settled",
            EngineStatus::TornDown => "stopped",
        }
    }
}

enum Assets {
    Loading { failures: u32 },
    Ready(ModelRegistry),
}

/// The roll currently owning the world
struct ActiveRoll {
    request: RollRequest,
    world: PhysicsWorld,
    detector: SettlementDetector,
}

pub type SettledCallback = Box<dyn FnMut(&RollResult)>;

pub struct DiceEngine {
    config: EngineConfig,
    assets: Assets,
    /// Single slot: the latest roll requested while loading
    queued: Option<RollRequest>,
    active: Option<ActiveRoll>,
    /// Reported guard for the active roll
    reported: Option<RollKey>,
    last_reported: Option<RollRequest>,
    last_result: Option<RollResult>,
    transports: TransportHub,
    renderer: Option<Box<dyn DiceRenderer>>,
    on_settled: Option<SettledCallback>,
    /// A frame callback is wanted for the active roll
    frame_pending: bool,
    /// When the safety timer fires (driver clock, ms)
    safety_deadline: Option<f64>,
    torn_down: bool,
}

impl DiceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = EngineConfig {
            settings: config.settings.validated(),
            ..config
        };
        let transports = TransportHub::new(config.room.clone(), config.instance_id.clone());
        log::info!(
            "Dice engine created (room: {}, instance: {})",
            config.room,
            config.instance_id
        );

        Self {
            config,
            assets: Assets::Loading { failures: 0 },
            queued: None,
            active: None,
            reported: None,
            last_reported: None,
            last_result: None,
            transports,
            renderer: None,
            on_settled: None,
            frame_pending: false,
            safety_deadline: None,
            torn_down: false,
        }
    }

    // === Wiring ===

    pub fn set_renderer(&mut self, mut renderer: Box<dyn DiceRenderer>) {
        if self.torn_down {
            return;
        }
        if let Assets::Ready(registry) = &self.assets {
            renderer.prepare(registry);
        }
        self.renderer = Some(renderer);
    }

    pub fn set_on_settled(&mut self, callback: impl FnMut(&RollResult) + 'static) {
        if self.torn_down {
            return;
        }
        self.on_settled = Some(Box::new(callback));
    }

    pub fn add_transport(&mut self, transport: Box<dyn RollTransport>) {
        if self.torn_down {
            return;
        }
        self.transports.add(transport);
    }

    /// Finish the one-time asset load; replays a queued roll on success
    pub fn on_assets_loaded(&mut self, loaded: Result<ModelRegistry, AssetError>, now: f64) {
        if self.torn_down {
            return;
        }
        match loaded {
            Ok(registry) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.prepare(&registry);
                }
                log::info!("Dice models ready ({} types)", registry.len());
                self.assets = Assets::Ready(registry);

                if let Some(request) = self.queued.take() {
                    log::info!("Replaying queued roll seed={}", request.seed);
                    self.begin_roll(request, now);
                }
            }
            Err(e) => {
                if let Assets::Loading { failures } = &mut self.assets {
                    *failures += 1;
                }
                log::warn!("Dice model loading failed, staying in loading state: {e}");
            }
        }
    }

    // === Roll entry points ===

    /// Roll locally with a fresh seed and broadcast it
    pub fn trigger_roll(&mut self, count: u32, sides: u32, now: f64) -> Result<RollRequest, RollError> {
        self.trigger_seeded_roll(fresh_seed(), count, sides, now)
    }

    /// Roll locally with a given seed and broadcast it
    pub fn trigger_seeded_roll(
        &mut self,
        seed: u32,
        count: u32,
        sides: u32,
        now: f64,
    ) -> Result<RollRequest, RollError> {
        if self.torn_down {
            return Err(RollError::TornDown);
        }
        let name = match self.config.settings.display_name.as_str() {
            "" => self.config.instance_id.clone(),
            name => name.to_string(),
        };
        let request = RollRequest::new(
            seed,
            count,
            sides,
            self.config.room.clone(),
            self.config.instance_id.clone(),
        )?
        .with_triggered_by(name);

        // Publish before simulating so peers start as early as possible
        let delivered = self.transports.publish(&RollMessage::from_request(&request));
        log::debug!("Roll seed={seed} published to {delivered} transport(s)");

        self.start_or_queue(request.clone(), now);
        Ok(request)
    }

    /// A roll delivered by a transport; returns whether it was accepted
    pub fn receive_roll(
        &mut self,
        seed: u32,
        count: u32,
        sides: u32,
        origin: &str,
        now: f64,
    ) -> Result<bool, RollError> {
        if self.torn_down {
            return Err(RollError::TornDown);
        }
        let request = RollRequest::new(seed, count, sides, self.config.room.clone(), origin)?
            .with_triggered_by(origin);
        Ok(self.receive_request(request, now))
    }

    /// Accept a fully formed incoming request (self-origin and duplicates ignored)
    pub fn receive_request(&mut self, request: RollRequest, now: f64) -> bool {
        if self.torn_down {
            return false;
        }
        if request.origin_instance == self.config.instance_id {
            log::debug!("Ignoring our own roll seed={}", request.seed);
            return false;
        }
        if request.room != self.config.room {
            log::debug!("Ignoring roll for room {}", request.room);
            return false;
        }
        if self.is_duplicate(&request) {
            log::debug!("Ignoring duplicate roll seed={}", request.seed);
            return false;
        }
        log::info!(
            "Received roll seed={} {}{} from {}",
            request.seed,
            request.count,
            request.sides,
            request.origin_instance
        );
        self.start_or_queue(request, now);
        true
    }

    /// Decode one raw transport frame and act on it
    pub fn handle_frame(&mut self, frame: &str, now: f64) -> bool {
        if self.torn_down {
            return false;
        }
        let msg = match decode_frame(frame, &self.config.room, &self.config.instance_id) {
            Ok(msg) => msg,
            Err(reason) => {
                log::debug!("Discarded frame: {reason:?}");
                return false;
            }
        };
        match msg.to_request() {
            Ok(request) => self.receive_request(request, now),
            Err(e) => {
                log::debug!("Discarded frame: {e}");
                false
            }
        }
    }

    /// Drain every transport; returns how many rolls were accepted
    pub fn poll_transports(&mut self, now: f64) -> usize {
        if self.torn_down {
            return 0;
        }
        let mut accepted = 0;
        for msg in self.transports.poll() {
            match msg.to_request() {
                Ok(request) => {
                    if self.receive_request(request, now) {
                        accepted += 1;
                    }
                }
                Err(e) => log::debug!("Discarded message: {e}"),
            }
        }
        accepted
    }

    // === Clock callbacks ===

    /// Frame callback: one physics step, settlement check, then render
    ///
    /// Returns whether a frame was consumed.
    pub fn on_frame(&mut self, now: f64) -> bool {
        if self.torn_down || !self.frame_pending {
            return false;
        }
        let Some(active) = self.active.as_mut() else {
            self.frame_pending = false;
            return false;
        };
        let settled = step_once(&mut active.world, &mut active.detector);
        log::trace!("Frame at {now:.0} ms: step {}", active.detector.steps());
        let visuals = active.world.visuals();

        self.render(&visuals);
        if let Some(reason) = settled {
            self.settle(reason);
        }
        true
    }

    /// Safety timer: once the hard cap has passed on the driver's clock, finish
    /// the roll without rendering, up to the step the frame loop would settle on
    pub fn on_timer(&mut self, now: f64) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(deadline) = self.safety_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        let forced = self.active.as_mut().and_then(|active| {
            let reason = step_to_settlement(&mut active.world, &mut active.detector)?;
            log::debug!("Caught up to step {} ({reason:?})", active.detector.steps());
            active.detector.mark_forced();
            Some(SettleReason::SafetyTimer)
        });
        match forced {
            Some(reason) => {
                log::warn!("Safety timer settled a stalled roll");
                self.settle(reason);
                true
            }
            None => {
                self.safety_deadline = None;
                false
            }
        }
    }

    /// Manual-driver convenience: transports, then frame, then timer
    pub fn advance(&mut self, now: f64) {
        self.poll_transports(now);
        self.on_frame(now);
        self.on_timer(now);
    }

    /// Permanently stop: cancel callbacks, free the world, drop resources
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.frame_pending = false;
        self.safety_deadline = None;
        self.active = None;
        self.queued = None;
        self.transports.clear();
        self.renderer = None;
        self.on_settled = None;
        log::info!("Dice engine torn down");
    }

    // === Queries ===

    pub fn status(&self) -> EngineStatus {
        if self.torn_down {
            return EngineStatus::TornDown;
        }
        if matches!(self.assets, Assets::Loading { .. }) {
            return EngineStatus::Loading;
        }
        match &self.active {
            Some(active) if active.detector.is_rolling() => EngineStatus::Rolling,
            Some(active) if active.detector.is_settled() => EngineStatus::Settled,
            _ => EngineStatus::Idle,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn room(&self) -> &str {
        &self.config.room
    }

    pub fn registry(&self) -> Option<&ModelRegistry> {
        match &self.assets {
            Assets::Ready(registry) => Some(registry),
            Assets::Loading { .. } => None,
        }
    }

    /// Failed load attempts so far
    pub fn load_failures(&self) -> u32 {
        match self.assets {
            Assets::Loading { failures } => failures,
            Assets::Ready(_) => 0,
        }
    }

    pub fn queued_request(&self) -> Option<&RollRequest> {
        self.queued.as_ref()
    }

    pub fn active_request(&self) -> Option<&RollRequest> {
        self.active.as_ref().map(|a| &a.request)
    }

    /// Clock time the active roll started at
    pub fn roll_started_at(&self) -> Option<f64> {
        match self.active.as_ref()?.detector.phase() {
            RollPhase::Rolling { started_at }
            | RollPhase::Settled { started_at, .. } => Some(started_at),
            RollPhase::Idle => None,
        }
    }

    pub fn visuals(&self) -> Vec<DieVisual> {
        self.active
            .as_ref()
            .map(|a| a.world.visuals())
            .unwrap_or_default()
    }

    /// Collider chosen for each die of the active roll
    pub fn active_colliders(&self) -> Vec<ColliderKind> {
        self.active
            .as_ref()
            .map(|a| a.world.dice().iter().map(|d| d.collider).collect())
            .unwrap_or_default()
    }

    /// Physics steps taken by the active roll
    pub fn active_steps(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.world.steps())
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn safety_deadline(&self) -> Option<f64> {
        self.safety_deadline
    }

    pub fn last_result(&self) -> Option<&RollResult> {
        self.last_result.as_ref()
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    // === Internals ===

    fn is_duplicate(&self, request: &RollRequest) -> bool {
        let same = |other: Option<&RollRequest>| other.is_some_and(|o| o.same_throw(request));
        same(self.active_request()) || same(self.last_reported.as_ref()) || same(self.queued.as_ref())
    }

    fn start_or_queue(&mut self, request: RollRequest, now: f64) {
        if matches!(self.assets, Assets::Loading { .. }) {
            if let Some(replaced) = self.queued.replace(request) {
                log::info!("Queued roll seed={} replaced by a newer roll", replaced.seed);
            } else {
                log::info!("Assets still loading; roll queued");
            }
            return;
        }
        self.begin_roll(request, now);
    }

    fn begin_roll(&mut self, request: RollRequest, now: f64) {
        let Assets::Ready(registry) = &self.assets else {
            self.queued = Some(request);
            return;
        };

        // Last roll wins: the previous world is dropped before the new one exists
        if let Some(previous) = self.active.take() {
            if previous.detector.is_rolling() {
                log::info!("Discarding in-flight roll seed={}", previous.request.seed);
            }
        }
        self.frame_pending = false;
        self.safety_deadline = None;

        let world = match PhysicsWorld::build(registry, &request) {
            Ok(world) => world,
            Err(e) => {
                // Kept for the next successful asset load
                log::warn!("Could not build roll seed={}, keeping it queued: {e}", request.seed);
                self.queued = Some(request);
                return;
            }
        };
        let mut detector = SettlementDetector::new(SettleConfig::default());
        detector.start(now);
        self.queued = None;

        log::info!(
            "Rolling {}{} seed={} (origin: {})",
            request.count,
            request.sides,
            request.seed,
            request.origin_instance
        );

        self.safety_deadline = detector.safety_deadline();
        self.frame_pending = true;
        self.reported = None;
        self.active = Some(ActiveRoll {
            request,
            world,
            detector,
        });
    }

    fn settle(&mut self, reason: SettleReason) {
        self.frame_pending = false;
        self.safety_deadline = None;

        let Some(active) = self.active.as_mut() else {
            return;
        };
        let key = active.request.key();
        if self.reported == Some(key) {
            return;
        }
        let Assets::Ready(registry) = &self.assets else {
            return;
        };

        active.world.freeze();
        let values = match resolve_values(registry, active.world.orientations()) {
            Ok(values) => values,
            Err(e) => {
                log::error!("Could not read faces for seed={}: {e}", key.seed);
                return;
            }
        };

        let request = &active.request;
        let result = RollResult {
            seed: request.seed,
            count: request.count,
            sides: request.sides.sides(),
            values,
            triggered_by: request.triggered_by.clone(),
        };
        log::info!(
            "Roll settled ({reason:?} after {} steps, {:.0} ms): {}",
            active.detector.steps(),
            active.detector.elapsed_ms(),
            result.summary()
        );

        self.reported = Some(key);
        self.last_reported = Some(request.clone());
        self.last_result = Some(result.clone());

        let visuals = active.world.visuals();
        self.render(&visuals);

        if let Some(callback) = self.on_settled.as_mut() {
            callback(&result);
        }
    }

    fn render(&mut self, visuals: &[DieVisual]) {
        if let Some(renderer) = self.renderer.as_mut() {
            if let Err(e) = renderer.render(visuals) {
                log::warn!("Render failed: {e}");
            }
        }
    }
}

impl Drop for DiceEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
