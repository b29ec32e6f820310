/// Terminal host for the soft-body demo: ASCII output, mouse input, frame pacing
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use log::{error, info};
use std::io::{self, stdout, Stdout, Write};
use std::time::{Duration, Instant};
use sb3d_core::{
    start_after_load, CancellationToken, DemoConfig, Error, FrameHost, InteractionHandler, LoadTask, Mesh,
    RenderLoop, Renderer, SceneContext, Viewport,
};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Width of a terminal cell relative to its height
pub const CELL_ASPECT: f32 = 0.5;

/// Scroll zoom step
const ZOOM_STEP: f32 = 1.1;

/// Viewport matching the current terminal size
pub fn terminal_viewport() -> io::Result<Viewport> {
    let (width, height) = terminal::size()?;
    Ok(cell_viewport(width, height))
}

fn cell_viewport(width: u16, height: u16) -> Viewport {
    let mut viewport = Viewport::new(width.max(1) as u32, height.max(1) as u32);
    viewport.pixel_aspect = CELL_ASPECT;
    viewport
}

/// Draws the scene to stdout with a one-line status overlay
pub struct TerminalRenderer {
    ascii: AsciiRenderer,
    out: Stdout,
    last_fps_sample: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalRenderer {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            ascii: AsciiRenderer::new(viewport.width as usize, viewport.height as usize),
            out: stdout(),
            last_fps_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    fn draw(&mut self, ctx: &SceneContext) -> io::Result<()> {
        self.ascii
            .resize(ctx.viewport.width as usize, ctx.viewport.height as usize);
        self.ascii.clear();
        if let Some(object) = &ctx.object {
            self.ascii.render_object(object, &ctx.camera);
        }

        queue!(self.out, cursor::MoveTo(0, 0))?;
        self.ascii.draw(&mut self.out)?;

        // Update FPS counter
        self.frame_count += 1;
        let now = Instant::now();
        if (now - self.last_fps_sample).as_secs() >= 1 {
            self.fps = self.frame_count as f32 / (now - self.last_fps_sample).as_secs_f32();
            self.frame_count = 0;
            self.last_fps_sample = now;
        }

        let proxy = match &ctx.proxy {
            Some(proxy) => format!("{:?} proxy", proxy.shape),
            None => "no proxy".to_string(),
        };
        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "SB3D | FPS: {:.1} | {} | click=push drag=orbit wheel=zoom q=quit",
                self.fps, proxy
            )),
            ResetColor
        )?;

        self.out.flush()
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, ctx: &SceneContext) -> sb3d_core::Result<()> {
        self.draw(ctx).map_err(|e| Error::Render(e.to_string()))
    }
}

/// Left-button gesture in progress
#[derive(Debug, Clone, Copy)]
struct Press {
    column: u16,
    row: u16,
    dragged: bool,
}

/// crossterm event pump acting as the display-refresh callback.
///
/// Raw mode and the alternate screen are entered on the first frame and
/// restored on drop.
pub struct TerminalHost {
    token: CancellationToken,
    interaction: InteractionHandler,
    frame_time: Duration,
    last_frame: Option<Instant>,
    press: Option<Press>,
    active: bool,
}

impl TerminalHost {
    pub fn new(token: CancellationToken, target_fps: u32) -> Self {
        Self {
            token,
            interaction: InteractionHandler::new(),
            frame_time: Duration::from_secs(1) / target_fps.max(1),
            last_frame: None,
            press: None,
            active: false,
        }
    }

    pub fn interaction(&self) -> &InteractionHandler {
        &self.interaction
    }

    fn enter(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
        self.active = true;
        Ok(())
    }

    fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        terminal::disable_raw_mode()?;
        execute!(stdout(), DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show)
    }

    fn handle_event(&mut self, event: Event, ctx: &mut SceneContext) {
        match event {
            Event::Key(KeyEvent { code, modifiers, .. }) => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.token.cancel(),
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => self.token.cancel(),
                _ => {}
            },
            Event::Mouse(mouse) => self.handle_mouse(mouse, ctx),
            Event::Resize(width, height) => ctx.set_viewport(cell_viewport(width, height)),
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, ctx: &mut SceneContext) {
        let MouseEvent { kind, column, row, .. } = mouse;
        match kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.press = Some(Press {
                    column,
                    row,
                    dragged: false,
                });
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(press) = self.press.as_mut() {
                    // Columns are about half as wide as rows are tall
                    let dx = (column as f32 - press.column as f32) * CELL_ASPECT;
                    let dy = row as f32 - press.row as f32;
                    ctx.controls.rotate_by_pixels(dx, dy, ctx.viewport.height);
                    *press = Press {
                        column,
                        row,
                        dragged: true,
                    };
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(Press { dragged: false, .. }) = self.press.take() {
                    // Aim at the centre of the clicked cell
                    let (x, y) = (column as f32 + 0.5, row as f32 + 0.5);
                    if let Err(e) = self.interaction.click(ctx, x, y) {
                        error!("click at ({}, {}) failed: {}", column, row, e);
                    }
                }
            }
            MouseEventKind::ScrollUp => ctx.controls.zoom(1.0 / ZOOM_STEP),
            MouseEventKind::ScrollDown => ctx.controls.zoom(ZOOM_STEP),
            _ => {}
        }
    }
}

impl FrameHost for TerminalHost {
    fn next_frame(&mut self, ctx: &mut SceneContext) -> Option<Duration> {
        if !self.active {
            if let Err(e) = self.enter() {
                error!("cannot take over the terminal: {}", e);
                return None;
            }
        }

        let deadline = self
            .last_frame
            .map_or_else(Instant::now, |last| last + self.frame_time);

        // Pump input until the next frame is due
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match event::poll(remaining) {
                Ok(true) => match event::read() {
                    Ok(event) => self.handle_event(event, ctx),
                    Err(e) => {
                        error!("terminal input failed: {}", e);
                        return None;
                    }
                },
                Ok(false) => break,
                Err(e) => {
                    error!("terminal input failed: {}", e);
                    return None;
                }
            }
            if self.token.is_cancelled() || remaining.is_zero() {
                break;
            }
        }

        let now = Instant::now();
        let dt = self.last_frame.map_or(self.frame_time, |last| now - last);
        self.last_frame = Some(now);
        Some(dt)
    }
}

impl Drop for TerminalHost {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            error!("failed to restore the terminal: {}", e);
        }
    }
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    ctx: SceneContext,
    renderer: TerminalRenderer,
    host: TerminalHost,
    token: CancellationToken,
}

impl TerminalApp {
    pub fn new(config: DemoConfig) -> io::Result<Self> {
        let viewport = terminal_viewport()?;
        let token = CancellationToken::new();
        let host = TerminalHost::new(token.clone(), config.target_fps);

        Ok(Self {
            renderer: TerminalRenderer::new(&viewport),
            ctx: SceneContext::new(config, viewport),
            host,
            token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for `task`, then render until the user quits
    pub fn run(&mut self, task: LoadTask) -> sb3d_core::Result<u64> {
        info!("loading {}", task.path().display());
        let frames = start_after_load(task, &mut self.ctx, &mut self.renderer, &mut self.host, &self.token);
        self.finish(frames)
    }

    /// Render an already loaded mesh until the user quits
    pub fn run_mesh(&mut self, mesh: Mesh) -> sb3d_core::Result<u64> {
        if let Err(e) = self.ctx.on_mesh_loaded(mesh) {
            error!("could not set up the loaded mesh: {}", e);
        }
        let frames = RenderLoop::new().run(&mut self.ctx, &mut self.renderer, &mut self.host, &self.token);
        self.finish(frames)
    }

    fn finish(&mut self, frames: sb3d_core::Result<u64>) -> sb3d_core::Result<u64> {
        if let Err(e) = self.host.leave() {
            error!("failed to restore the terminal: {}", e);
        }
        info!("{} clicks handled", self.host.interaction().clicks());
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneContext {
        let mut ctx = SceneContext::new(DemoConfig::default(), cell_viewport(80, 40));
        ctx.on_mesh_loaded(Mesh::cube(2.0)).unwrap();
        ctx
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_cell_viewport_aspect() {
        let viewport = cell_viewport(80, 40);
        assert!((viewport.aspect() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_click_on_cube_pushes_body() {
        let mut ctx = scene();
        let mut host = TerminalHost::new(CancellationToken::new(), 30);

        host.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 41, 21), &mut ctx);
        host.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 41, 21), &mut ctx);

        assert_eq!(host.interaction().clicks(), 1);
        assert!(host.interaction().last_impulse().is_some());
    }

    #[test]
    fn test_drag_orbits_instead_of_clicking() {
        let mut ctx = scene();
        let mut host = TerminalHost::new(CancellationToken::new(), 30);
        let before = ctx.camera.position;

        host.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 41, 21), &mut ctx);
        host.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 50, 21), &mut ctx);
        host.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 50, 21), &mut ctx);
        ctx.controls.update(&mut ctx.camera);

        assert_eq!(host.interaction().clicks(), 0);
        assert!((ctx.camera.position - before).norm() > 0.1);
    }

    #[test]
    fn test_quit_key_cancels() {
        let mut ctx = scene();
        let token = CancellationToken::new();
        let mut host = TerminalHost::new(token.clone(), 30);

        host.handle_event(Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)), &mut ctx);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_resize_updates_viewport() {
        let mut ctx = scene();
        let mut host = TerminalHost::new(CancellationToken::new(), 30);

        host.handle_event(Event::Resize(120, 30), &mut ctx);
        assert_eq!(ctx.viewport.width, 120);
        assert!((ctx.camera.aspect - 2.0).abs() < 1e-6);
    }
}
