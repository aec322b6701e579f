use super::math::{Color, Vec3};
use crate::engine::overlay::Space;
use crate::engine::target::ObjectId;
use anyhow::Result;
use log::debug;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line { points: Vec<Vec3>, closed: bool, width: f32 },
    Text { text: String, at: Vec3, size: f32 },
}

/// One visible object, already in frame coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub id: ObjectId,
    pub space: Space,
    pub primitive: Primitive,
    pub color: Color,
    /// Camera-space depth, larger is nearer. Zero for screen items.
    pub depth: f32,
}

/// Everything drawn for one tick: world items first, then overlays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub time: f32,
    pub background: Color,
    pub items: Vec<DrawItem>,
}

impl Frame {
    pub fn items_in(&self, space: Space) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(move |item| item.space == space)
    }

    pub fn find(&self, id: ObjectId) -> Option<&DrawItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Line list vertices: each polyline segment becomes two vertices.
    pub fn line_vertices(&self) -> Vec<Vertex> {
        let mut vertices = Vec::with_capacity(1024);
        for item in &self.items {
            let Primitive::Line { points, closed, .. } = &item.primitive else {
                continue;
            };
            let color = [item.color.r, item.color.g, item.color.b, item.color.a];
            let vertex = |p: &Vec3| Vertex { pos: [p.x, p.y], color };
            for pair in points.windows(2) {
                vertices.push(vertex(&pair[0]));
                vertices.push(vertex(&pair[1]));
            }
            if *closed && points.len() > 2 {
                if let (Some(last), Some(first)) = (points.last(), points.first()) {
                    vertices.push(vertex(last));
                    vertices.push(vertex(first));
                }
            }
        }
        vertices
    }
}

/// Presents composed frames. Encoding, windows and GPUs live behind this.
pub trait Renderer {
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// Headless renderer that keeps the latest frame and byte counts.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    pub frames: u64,
    pub bytes: usize,
    pub last: Option<Frame>,
}

impl Renderer for FrameRecorder {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let vertices = frame.line_vertices();
        let data: &[u8] = bytemuck::cast_slice(&vertices);
        self.frames += 1;
        self.bytes += data.len();
        debug!(
            "frame {}: {} items, {} vertex bytes",
            frame.index,
            frame.items.len(),
            data.len()
        );
        self.last = Some(frame.clone());
        Ok(())
    }
}
