//! Screen-anchored time/value panels.

use crate::engine::overlay::{Space, Stage};
use crate::engine::sampler::Series;
use crate::engine::target::ObjectId;
use crate::gfx::math::{Color, Vec3};
use crate::gfx::scene::{Scene, Shape, VisualNode};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct GraphPanel {
    pub center: Vec3,
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
    pub x_length: f32,
    pub y_length: f32,
    /// Horizontal guide lines, in data units.
    pub grid: Vec<f32>,
    /// One label per grid level, drawn left of the panel. May be empty.
    pub grid_labels: Vec<String>,
    /// Text drawn above the panel.
    pub title: Option<String>,
    /// Channel name drawn left of the panel.
    pub indicator: Option<String>,
    pub color: Color,
    pub axis_color: Color,
    pub grid_color: Color,
}

/// Node ids of a built panel.
#[derive(Debug, Clone)]
pub struct PanelNodes {
    pub group: ObjectId,
    pub axes: ObjectId,
    pub grid: Vec<ObjectId>,
    pub labels: Vec<ObjectId>,
}

impl GraphPanel {
    pub fn new(center: Vec3, x_range: (f32, f32), y_range: (f32, f32), x_length: f32, y_length: f32) -> Self {
        Self {
            center,
            x_range,
            y_range,
            x_length,
            y_length,
            grid: Vec::new(),
            grid_labels: Vec::new(),
            title: None,
            indicator: None,
            color: Color::WHITE,
            axis_color: Color::WHITE,
            grid_color: Color::WHITE,
        }
    }

    /// Data coordinates to frame coordinates.
    pub fn c2p(&self, t: f32, v: f32) -> Vec3 {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let x = ((t - x0) / (x1 - x0) - 0.5) * self.x_length;
        let y = ((v - y0) / (y1 - y0) - 0.5) * self.y_length;
        self.center + Vec3::new(x, y, 0.0)
    }

    pub fn plot(&self, series: &Series) -> Vec<Vec3> {
        series.map_points(|s| self.c2p(s.time, s.value))
    }

    /// Adds the panel to the scene, anchored to screen space.
    pub fn build(&self, scene: &mut Scene, stage: &mut Stage) -> Result<PanelNodes> {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let x_at = 0.0f32.clamp(y0, y1);
        let y_at = 0.0f32.clamp(x0, x1);

        let x_axis = scene.add_polyline("panel.x-axis", vec![self.c2p(x0, x_at), self.c2p(x1, x_at)], self.axis_color);
        let y_axis = scene.add_polyline("panel.y-axis", vec![self.c2p(y_at, y0), self.c2p(y_at, y1)], self.axis_color);
        for id in [x_axis, y_axis] {
            if let Some(node) = scene.get_mut(id) {
                node.stroke_width = 1.2;
            }
        }
        let axes = scene.add_group("panel.axes", &[x_axis, y_axis])?;

        let mut grid = Vec::with_capacity(self.grid.len());
        for level in &self.grid {
            let line = scene.add(
                VisualNode::new(format!("panel.grid{}", level), Shape::Polyline { closed: false })
                    .with_points(vec![self.c2p(x0, *level), self.c2p(x1, *level)])
                    .with_color(self.grid_color.with_alpha(0.4))
                    .with_stroke_width(0.5),
            );
            grid.push(line);
        }

        let mut labels = Vec::new();
        for (level, text) in self.grid.iter().zip(&self.grid_labels) {
            let at = self.c2p(x0, *level) + Vec3::new(-0.25, 0.0, 0.0);
            labels.push(scene.add_label(text.clone(), 0.15, at, self.grid_color));
        }
        if let Some(title) = &self.title {
            let at = self.center + Vec3::new(0.0, self.y_length * 0.5 + 0.25, 0.0);
            labels.push(scene.add_label(title.clone(), 0.35, at, self.color));
        }
        if let Some(name) = &self.indicator {
            let at = self.center - Vec3::new(self.x_length * 0.5 + 0.55, 0.0, 0.0);
            labels.push(scene.add_label(name.clone(), 0.22, at, self.color));
        }

        let mut children = vec![axes];
        children.extend(&grid);
        children.extend(&labels);
        let group = scene.add_group("panel", &children)?;
        stage.anchor(scene, group, Space::Screen)?;

        Ok(PanelNodes { group, axes, grid, labels })
    }
}
