//! The render-side surface: colours, the pannable/zoomable viewport, the
//! draw trait the driver calls from the render thread, and a headless
//! implementation for benchmarks and tests.

use genesim_core::{Area, Organism, ResourcePool, STAT_CEILING, Vec2};

/// Fill colour of food items.
pub const FOOD_FILL: Rgba = Rgba::new(2, 33, 2, 192);
/// Fill colour of water items.
pub const WATER_FILL: Rgba = Rgba::new(8, 173, 214, 192);
/// Outline shared by resources and organisms at rest.
pub const ITEM_OUTLINE: Rgba = Rgba::new(138, 31, 89, 200);
/// Organism fill at the weakest health stat.
pub const ORGANISM_WEAK: Rgba = Rgba::new(193, 21, 21, 128);
/// Organism fill at full health.
pub const ORGANISM_STRONG: Rgba = Rgba::new(5, 252, 83, 128);
/// Outline at the instant of a gene transfer; fades back to the rest
/// outline.
pub const TRANSFER_GLOW: Rgba = Rgba::new(5, 21, 252, 200);

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLUE: Self = Self::new(0, 0, 255, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Linear blend from `self` (at 0) to `other` (at 1).
    #[must_use]
    pub fn gradient(self, other: Self, progress: f32) -> Self {
        let p = progress.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (f32::from(b) * p + f32::from(a) * (1.0 - p)) as u8;
        Self::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
            channel(self.a, other.a),
        )
    }

    /// Three-stop blend: `self` → `mid` over the first half of `progress`,
    /// `mid` → `far` over the second.
    #[must_use]
    pub fn double_gradient(self, mid: Self, far: Self, progress: f32) -> Self {
        let p = progress * 2.0;
        if p < 1.0 {
            self.gradient(mid, p)
        } else {
            mid.gradient(far, p - 1.0)
        }
    }

    /// Parse a 3-byte hex string such as `"ffffff"`; alpha is opaque.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255))
    }
}

/// Fill colour for an organism: red→green over its weakest health stat.
#[must_use]
pub fn organism_fill(organism: &Organism) -> Rgba {
    let weakest = organism
        .nutrition()
        .min(organism.hydration())
        .min(organism.integrity())
        .clamp(0, STAT_CEILING);
    ORGANISM_WEAK.gradient(ORGANISM_STRONG, weakest as f32 / STAT_CEILING as f32)
}

/// Outline colour for an organism: a blue glow fading out over the
/// gene-transfer effect window.
#[must_use]
pub fn organism_outline(organism: &Organism, fps: u32) -> Rgba {
    let effect = organism.transfer_effect();
    if effect >= 0 {
        TRANSFER_GLOW.gradient(ITEM_OUTLINE, effect as f32 / (fps as f32 * 1.5))
    } else {
        ITEM_OUTLINE
    }
}

/// Annotation swatch colour for a temperature: blue→yellow→red over
/// 200 K..400 K.
#[must_use]
pub fn temperature_color(kelvin: f32) -> Rgba {
    Rgba::BLUE.double_gradient(Rgba::YELLOW, Rgba::RED, (kelvin - 200.0) / 200.0)
}

/// Input gestures consumed by the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pan { dx: i32, dy: i32 },
    Zoom { delta: f32 },
    ToggleFramerateLimit,
    Close,
}

/// Overlay values drawn on top of the population each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnnotations {
    pub timestep: u32,
    /// Wall-clock-equivalent seconds at the standard framerate.
    pub elapsed_seconds: u32,
    pub viewport_origin: (i32, i32),
    pub zoom_factor: f32,
    /// Temperature at the viewport's top latitude, Kelvin.
    pub upper_temperature: f32,
    pub upper_color: Rgba,
    /// Temperature at the viewport's bottom latitude, Kelvin.
    pub lower_temperature: f32,
    pub lower_color: Rgba,
}

/// The window into the world: origin and zoom over a fixed-resolution
/// output, plus the framerate-limit toggle.
#[derive(Debug, Clone)]
pub struct Viewport {
    area: Area,
    window: (u32, u32),
    origin: (i32, i32),
    size: (f32, f32),
    zoom: f32,
    limit_framerate: bool,
}

impl Viewport {
    #[must_use]
    pub fn new(area: Area, window: (u32, u32)) -> Self {
        let window = (
            window.0.max(300).min(area.width),
            window.1.max(300).min(area.height),
        );
        Self {
            area,
            window,
            origin: (0, 0),
            size: (window.0 as f32, window.1 as f32),
            zoom: 1.0,
            limit_framerate: true,
        }
    }

    #[must_use]
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Viewport extent in world cells (window resolution over zoom).
    #[must_use]
    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    #[must_use]
    pub fn zoom_factor(&self) -> f32 {
        self.zoom
    }

    #[must_use]
    pub fn limit_framerate(&self) -> bool {
        self.limit_framerate
    }

    pub fn set_limit_framerate(&mut self, limit: bool) {
        self.limit_framerate = limit;
    }

    pub fn toggle_limit_framerate(&mut self) {
        self.limit_framerate = !self.limit_framerate;
    }

    /// Move the viewport origin, clamped so the viewport stays inside the
    /// area.
    pub fn set_location(&mut self, x: i32, y: i32) {
        let max_x = self.area.width as i32 - self.size.0.ceil() as i32;
        let max_y = self.area.height as i32 - self.size.1.ceil() as i32;
        self.origin = (x.clamp(0, max_x.max(0)), y.clamp(0, max_y.max(0)));
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.set_location(self.origin.0 + dx, self.origin.1 + dy);
    }

    /// Set the zoom factor, clamped between "viewport covers the whole
    /// area" and 3×, re-centring around the viewport middle.
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom_min = (self.window.0 as f32 / self.area.width_f())
            .max(self.window.1 as f32 / self.area.height_f());
        self.zoom = zoom.clamp(zoom_min, 3.0);

        let new_size = (
            self.window.0 as f32 / self.zoom,
            self.window.1 as f32 / self.zoom,
        );
        let delta = (new_size.0 - self.size.0, new_size.1 - self.size.1);
        self.size = new_size;
        self.pan(
            -(delta.0.round() as i32) / 2,
            -(delta.1.round() as i32) / 2,
        );
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.set_zoom(self.zoom + delta);
    }

    /// Project a world-space disc into output space, or `None` when it lies
    /// wholly outside the viewport.
    #[must_use]
    pub fn project(&self, position: Vec2, size: f32) -> Option<(Vec2, f32)> {
        let relative = Vec2::new(
            (position.x - self.origin.0 as f32) * self.zoom,
            (position.y - self.origin.1 as f32) * self.zoom,
        );
        let visible = relative.x + size >= 0.0
            && relative.x - size < self.window.0 as f32
            && relative.y + size >= 0.0
            && relative.y - size < self.window.1 as f32;
        visible.then_some((relative, size * self.zoom))
    }
}

/// Drawing and input surface driven only from the render thread; the core
/// never touches it.
pub trait RenderSurface: Send {
    /// Whether the surface is still accepting frames.
    fn is_open(&self) -> bool;

    /// Drain pending input events.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    fn clear(&mut self, background: Rgba);

    /// Draw a filled disc with an outline, in projected output coordinates.
    fn draw_disc(&mut self, center: Vec2, radius: f32, fill: Rgba, outline: Rgba);

    fn draw_annotations(&mut self, annotations: &FrameAnnotations);

    /// Present the finished frame.
    fn present(&mut self);

    /// Close the surface; [`RenderSurface::is_open`] returns false
    /// afterwards.
    fn close(&mut self);
}

/// Surface that draws nothing, optionally closing itself after a fixed
/// number of presented frames.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    closed: bool,
    frames_presented: u64,
    frame_limit: Option<u64>,
    discs_drawn: u64,
    queued_events: Vec<InputEvent>,
    last_annotations: Option<FrameAnnotations>,
}

impl HeadlessSurface {
    /// A surface that stays open until the run closes it.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A surface that closes itself after presenting `frames` frames.
    #[must_use]
    pub fn with_frame_limit(frames: u64) -> Self {
        Self {
            frame_limit: Some(frames),
            ..Self::default()
        }
    }

    /// Inject an input event to be drained by the next poll.
    pub fn queue_event(&mut self, event: InputEvent) {
        self.queued_events.push(event);
    }

    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    #[must_use]
    pub fn discs_drawn(&self) -> u64 {
        self.discs_drawn
    }

    #[must_use]
    pub fn last_annotations(&self) -> Option<&FrameAnnotations> {
        self.last_annotations.as_ref()
    }
}

impl RenderSurface for HeadlessSurface {
    fn is_open(&self) -> bool {
        !self.closed
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.queued_events)
    }

    fn clear(&mut self, _background: Rgba) {}

    fn draw_disc(&mut self, _center: Vec2, _radius: f32, _fill: Rgba, _outline: Rgba) {
        self.discs_drawn += 1;
    }

    fn draw_annotations(&mut self, annotations: &FrameAnnotations) {
        self.last_annotations = Some(*annotations);
    }

    fn present(&mut self) {
        self.frames_presented += 1;
        if let Some(limit) = self.frame_limit
            && self.frames_presented >= limit
        {
            self.closed = true;
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Draw every live item of a resource pool through the viewport.
pub fn draw_resource_pool(
    surface: &mut dyn RenderSurface,
    viewport: &Viewport,
    pool: &ResourcePool,
    fill: Rgba,
) {
    for item in pool.iter() {
        if !item.exists() {
            continue;
        }
        if let Some((center, radius)) = viewport.project(item.position(), item.size()) {
            surface.draw_disc(center, radius, fill, ITEM_OUTLINE);
        }
    }
}
