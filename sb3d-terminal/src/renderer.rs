/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Vector3;
use std::io::Write;
use sb3d_core::{Camera, RenderStyle, SceneObject, Triangle};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Screen-space vertex: pixel x, pixel y, NDC depth
type ScreenPoint = (f32, f32, f32);

/// ASCII renderer that converts 3D meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
    }

    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.char_buffer[y * self.width + x])
    }

    /// Number of cells covered by geometry
    pub fn covered(&self) -> usize {
        self.char_buffer.iter().filter(|&&c| c != ' ').count()
    }

    pub fn render_object(&mut self, object: &SceneObject, camera: &Camera) {
        let model = object.model_matrix();
        for local in object.mesh.triangles() {
            let world = local.transformed(&model);
            self.render_triangle(&world, camera, object.style);
        }
    }

    fn render_triangle(&mut self, triangle: &Triangle, camera: &Camera, style: RenderStyle) {
        // Vertices are already in world space
        let identity = nalgebra::Matrix4::identity();
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, vertex) in screen_coords.iter_mut().zip(&triangle.vertices) {
            match camera.project_to_screen(vertex, &identity, self.width as u32, self.height as u32) {
                Some(coords) => *slot = coords,
                None => return, // Triangle is clipped
            }
        }

        // Double-sided headlight shading
        let normal = triangle.normal();
        let light_dir = (camera.position - triangle.vertices[0])
            .try_normalize(1e-6)
            .unwrap_or_else(Vector3::z);
        let brightness = normal.dot(&light_dir).abs();
        if !brightness.is_finite() {
            return; // degenerate triangle
        }

        let char_index = 1 + (brightness * (LUMINOSITY_RAMP.len() - 2) as f32) as usize;
        let character = LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)];

        match style {
            RenderStyle::Shaded => self.rasterize_triangle(&screen_coords, character),
            RenderStyle::Wireframe => {
                for i in 0..3 {
                    self.draw_line(screen_coords[i], screen_coords[(i + 1) % 3], character);
                }
            }
        }
    }

    fn plot(&mut self, x: i32, y: i32, depth: f32, character: char) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.char_buffer[idx] = character;
        }
    }

    fn rasterize_triangle(&mut self, coords: &[ScreenPoint; 3], character: char) {
        let [v0, v1, v2] = *coords;

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                if let Some((w0, w1, w2)) = barycentric(
                    (v0.0, v0.1),
                    (v1.0, v1.1),
                    (v2.0, v2.1),
                    (px, py),
                ) {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                        self.plot(x, y, depth, character);
                    }
                }
            }
        }
    }

    /// DDA line with linearly interpolated depth
    fn draw_line(&mut self, from: ScreenPoint, to: ScreenPoint, character: char) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from.0 + dx * t;
            let y = from.1 + dy * t;
            let depth = from.2 + (to.2 - from.2) * t;
            self.plot(x.floor() as i32, y.floor() as i32, depth, character);
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGreen,
                    '-' | '=' => Color::Green,
                    '+' | '*' => Color::Yellow,
                    '#' | '%' | '@' => Color::White,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
