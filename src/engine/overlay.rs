//! World-space and camera-fixed drawing passes.
//!
//! Every node belongs to exactly one space. An explicit anchor covers the
//! node's whole subtree; nodes without an anchor anywhere up their parent
//! chain are drawn in world space. Screen-space nodes never see the camera,
//! so titles, captions and graph panels stay put while the world orbits.

use super::target::ObjectId;
use crate::error::EngineError;
use crate::gfx::draw::{DrawItem, Frame, Primitive};
use crate::gfx::math::{Color, Vec3};
use crate::gfx::scene::{Scene, Shape};
use log::{debug, info};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    World,
    Screen,
}

impl Space {
    pub fn other(self) -> Space {
        match self {
            Space::World => Space::Screen,
            Space::Screen => Space::World,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stage {
    anchors: BTreeMap<ObjectId, Space>,
    pub background: Color,
}

impl Stage {
    pub fn new(background: Color) -> Self {
        Self {
            anchors: BTreeMap::new(),
            background,
        }
    }

    /// Anchors `id` and its subtree to `space`.
    ///
    /// Fails with `DualAnchoring` if the node, an ancestor or a descendant is
    /// already anchored to the other space. Use [`Stage::reanchor`] to move a
    /// node between spaces on purpose.
    pub fn anchor(&mut self, scene: &Scene, id: ObjectId, space: Space) -> Result<(), EngineError> {
        if scene.get(id).is_none() {
            return Err(EngineError::UnknownObject(id.0));
        }
        let related = std::iter::once(id)
            .chain(scene.ancestors(id))
            .chain(scene.descendants(id));
        for other in related {
            if self.anchors.get(&other) == Some(&space.other()) {
                return Err(EngineError::DualAnchoring(id.0, space.other()));
            }
        }
        debug!("anchored {} to {:?} space", id, space);
        self.anchors.insert(id, space);
        Ok(())
    }

    /// Moves `id` to `space`, dropping anchors inside its subtree first.
    pub fn reanchor(&mut self, scene: &Scene, id: ObjectId, space: Space) -> Result<(), EngineError> {
        let previous = self.anchors.remove(&id);
        for d in scene.descendants(id) {
            self.anchors.remove(&d);
        }
        match self.anchor(scene, id, space) {
            Ok(()) => {
                info!("{} re-anchored {:?} -> {:?}", id, previous, space);
                Ok(())
            }
            Err(err) => {
                if let Some(prev) = previous {
                    self.anchors.insert(id, prev);
                }
                Err(err)
            }
        }
    }

    pub fn release(&mut self, id: ObjectId) -> Option<Space> {
        self.anchors.remove(&id)
    }

    pub fn anchor_of(&self, id: ObjectId) -> Option<Space> {
        self.anchors.get(&id).copied()
    }

    /// The node whose anchor decides `id`'s space: itself or its nearest
    /// anchored ancestor.
    pub fn anchor_root(&self, scene: &Scene, id: ObjectId) -> Option<(ObjectId, Space)> {
        std::iter::once(id)
            .chain(scene.ancestors(id))
            .find_map(|n| self.anchor_of(n).map(|space| (n, space)))
    }

    /// Resolved space: own anchor, else the nearest anchored ancestor, else world.
    pub fn space_of(&self, scene: &Scene, id: ObjectId) -> Space {
        self.anchor_root(scene, id)
            .map_or(Space::World, |(_, space)| space)
    }

    /// Parents `child` under `parent`, refusing moves that would put an
    /// anchored subtree under an ancestor anchored to the other space.
    pub fn attach(&self, scene: &mut Scene, parent: ObjectId, child: ObjectId) -> Result<(), EngineError> {
        if let Some((_, space)) = self.anchor_root(scene, parent) {
            let subtree = std::iter::once(child).chain(scene.descendants(child));
            for node in subtree {
                if self.anchor_of(node) == Some(space.other()) {
                    return Err(EngineError::DualAnchoring(node.0, space));
                }
            }
        }
        scene.attach(parent, child)
    }

    /// Builds one frame: the world pass through the camera, sorted far to
    /// near, followed by the screen pass in scene order.
    pub fn compose(&self, scene: &Scene, index: u64, time: f32) -> Frame {
        let mut world = Vec::new();
        let mut screen = Vec::new();

        for id in scene.ids() {
            let Some(node) = scene.get(id) else { continue };
            if node.is_group() {
                continue;
            }
            let opacity = scene.effective_opacity(id);
            if opacity <= 0.0 {
                continue;
            }
            let (space, matrix) = match self.anchor_root(scene, id) {
                Some((root, Space::Screen)) => (Space::Screen, scene.matrix_below(id, root)),
                _ => (Space::World, scene.world_matrix(id)),
            };
            let project = |p: Vec3| match space {
                Space::World => scene.camera.project(p),
                Space::Screen => p,
            };
            let primitive = match &node.shape {
                Shape::Polyline { closed } => {
                    if node.points.is_empty() {
                        continue;
                    }
                    Primitive::Line {
                        points: node
                            .points
                            .iter()
                            .map(|p| project(matrix.transform_point(*p)))
                            .collect(),
                        closed: *closed,
                        width: node.stroke_width,
                    }
                }
                Shape::Label { text, size } => Primitive::Text {
                    text: text.clone(),
                    at: project(matrix.transform_point(Vec3::ZERO)),
                    size: *size,
                },
                Shape::Group => continue,
            };
            let depth = match &primitive {
                Primitive::Line { points, .. } => {
                    points.iter().map(|p| p.z).sum::<f32>() / points.len() as f32
                }
                Primitive::Text { at, .. } => at.z,
            };
            let item = DrawItem {
                id,
                space,
                primitive,
                color: node.color.with_alpha(node.color.a * opacity),
                depth: if space == Space::World { depth } else { 0.0 },
            };
            match space {
                Space::World => world.push(item),
                Space::Screen => screen.push(item),
            }
        }

        world.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        world.extend(screen);
        Frame {
            index,
            time,
            background: self.background,
            items: world,
        }
    }
}
